//! Core data model: orders, fills, baselines, provenance, wire formats.

mod baseline;
mod fill;
mod order;
mod provenance;
mod wire;

pub use baseline::{BaselinePosition, BaselineSnapshot};
pub use fill::{Fill, FillReport};
pub use order::{Order, OrderRequest, OrderSide, OrderStatus, OrderType};
pub use provenance::{ProvenanceEntry, ProvenanceLog, keys};
pub use wire::{
    CancelCommand, CommandResult, CommandStatus, CompletedOrderRow, ExecutionEvent,
    LifecycleStatus, OpenOrderItem, OpenOrdersSnapshot, PositionItem, PositionsSnapshot,
};
