/// Bar synchronization
///
/// - `BarSynchronizer`: incremental fetch, merge and regularization per series
/// - `EodUpdater`: background worker running a pass after every market close

pub mod eod_updater;
pub mod synchronizer;

pub use eod_updater::{EodStatus, EodUpdater};
pub use synchronizer::{fetch_window_from_tail, BarSynchronizer, SyncEntry, SyncReport, SyncStatus};
