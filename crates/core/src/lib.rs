pub mod config;
pub mod error;
pub mod fetch;
pub mod forced_rollback;
pub mod health;
pub mod mailbox;
pub mod pattern;
pub mod point;
pub mod registry;
pub mod result;
pub mod store;

pub use error::Error;
pub use fetch::{FetchBlockClient, FetchBlockError};
pub use forced_rollback::{ForceRollbackHandle, ForceRollbackOutcome, ForceRollbackRequest};
pub use health::{ConnectionStatus, Health, HealthSnapshot};
pub use mailbox::{Drained, MailboxDrainer, MailboxItem};
pub use pattern::{Pattern, PatternParseError};
pub use point::{BlockHash, BlockSlot, Point, Tip};
pub use registry::PatternRegistry;
pub use result::{BinaryData, Input, OutputReference, Script, ScriptLanguage, Value};
pub use store::{BlockApply, ConnectionType, InputManagement, SortDirection, StatusFlag, Store, StoreError};
