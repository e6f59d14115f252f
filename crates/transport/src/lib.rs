pub mod gateway;
pub mod receipts;

pub use gateway::{DeliveryResult, PUSH_BATCH_LIMIT, PushGatewayClient, PushMessage};
pub use receipts::{ReceiptSummary, reconcile_receipts};
