//! Interactive components built on the runtime
//!
//! - [`modal`]: `<app-modal>`, portaled dialog with focus trap
//! - [`combobox`]: `<app-rich-select>`, filtering and remote-search combobox
//! - [`overlay`]: the overlay root shared by portaled content

pub mod combobox;
pub mod modal;
pub mod overlay;

pub use combobox::{Combobox, ComboboxAttr, ComboOption};
pub use modal::{Modal, ModalAttr};
pub use overlay::OverlayManager;
