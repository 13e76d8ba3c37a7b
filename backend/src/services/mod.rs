//! Business logic services for the Inventory ERP

pub mod adjustment;
pub mod batch;
pub mod bom;
pub mod external_process;
pub mod inventory;
pub mod item;
pub mod ledger;
pub mod production;
pub mod purchase_order;
pub mod receipt;
pub mod scrap;
pub mod shipment;
pub mod stock_movement;

pub use adjustment::AdjustmentService;
pub use batch::BatchService;
pub use bom::BomService;
pub use external_process::ExternalProcessService;
pub use inventory::InventoryService;
pub use item::ItemService;
pub use production::ProductionService;
pub use purchase_order::PurchaseOrderService;
pub use receipt::ReceiptService;
pub use scrap::ScrapService;
pub use shipment::ShipmentService;
pub use stock_movement::StockMovementService;
