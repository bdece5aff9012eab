use std::str::FromStr;

use super::LaneKind;
use crate::error::StoreError;

macro_rules! operations {
    ($($variant:ident => $lane:ident,)*) => {
        /// Every named store operation. The lane each one runs in is decided
        /// here and nowhere else.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum Operation {
            $($variant,)*
        }

        impl Operation {
            pub const ALL: &'static [Operation] = &[$(Operation::$variant,)*];

            pub const fn lane(self) -> LaneKind {
                match self {
                    $(Operation::$variant => LaneKind::$lane,)*
                }
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $(Operation::$variant => stringify!($variant),)*
                }
            }
        }
    };
}

operations! {
    SaveMessage => Serial,
    SaveMessages => Serial,
    GetMessageById => Parallel,
    GetMessagesByConversation => Parallel,
    RemoveMessage => Serial,
    RemoveMessages => Serial,
    GetMessageCount => Parallel,
    SearchMessages => Parallel,

    GetAttachmentReferencesForMessages => Parallel,

    SaveAttachmentDownloadJob => Serial,
    SaveAttachmentDownloadJobs => Serial,
    GetNextAttachmentDownloadJobs => Serial,
    GetAttachmentDownloadJob => Parallel,
    MarkAttachmentDownloadJobActive => Serial,
    FinishAttachmentDownloadJob => Serial,
    RemoveAttachmentDownloadJob => Serial,
    RemoveAttachmentDownloadJobsForMessage => Serial,
    RemoveAllBackupAttachmentDownloadJobs => Serial,
    ResetAttachmentDownloadActive => Serial,
    ResetBackupAttachmentDownloadJobsRetryAfter => Serial,
    ResetBackupAttachmentDownloadStats => Serial,
    GetBackupAttachmentDownloadProgress => Parallel,

    SaveSyncTasks => Serial,
    DequeueOldestSyncTasks => Serial,
    RemoveSyncTaskById => Serial,
    RemoveSyncTasks => Serial,
    IncrementAllSyncTaskAttempts => Serial,
    DeleteExpiredSyncTasks => Serial,

    GetItemById => Parallel,
    CreateOrUpdateItem => Serial,

    DisableMessageInsertTriggers => Serial,
    EnsureMessageInsertTriggersAreEnabled => Serial,

    GetSchemaVersions => Parallel,
}

impl FromStr for Operation {
    type Err = StoreError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.name() == name)
            .ok_or_else(|| StoreError::UnknownOperation(name.to_string()))
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
