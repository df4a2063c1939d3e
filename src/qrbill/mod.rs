//! Swiss QR-bill building blocks: payment reference, payload encoding and
//! slip layout.

pub mod iban;
pub mod layout;
pub mod model;
pub mod payload;
pub mod qr_code;
pub mod reference;
pub mod validation;

pub use layout::{Language, PlacedSlip, SlipGeometry, SlipLayout};
pub use model::{Currency, InvoicePaymentData};
pub use payload::{PayloadEncoder, SlipPayload, TruncationWarning, PAYLOAD_FIELD_COUNT};
pub use reference::PaymentReference;
pub use validation::{ValidationError, ValidationErrors};
