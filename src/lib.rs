//! Incrementally synchronized tag tree with an animated count-bar overlay.
//!
//! The engine keeps a per-note tag index, folds host change events into it
//! through a debounced reconciler, and renders the result as expandable
//! rows with background bars whose width tracks each tag's share of the
//! maximum aggregate count. Bars live in an overlay of their own and are
//! glued to the rows by time-boxed sync windows, so structural animation
//! (expand, collapse, appear, disappear) stays smooth while everything
//! else snaps.
//!
//! Everything is single threaded and frame driven: the host owns the
//! clock and passes `Instant`s in. [`session::PanelSession`] is the entry
//! point; [`vault::FsVault`] and the in-memory test store both sit behind
//! [`store::NoteStore`].

pub mod anim;
pub mod color;
pub mod config;
pub mod expand;
pub mod idle;
pub mod index;
pub mod layout;
pub mod overlay;
pub mod reconcile;
pub mod rows;
pub mod schedule;
pub mod session;
pub mod settings;
pub mod store;
pub mod tags;
pub mod tree;
pub mod vault;

pub use config::PanelConfig;
pub use reconcile::HostEvent;
pub use session::{
    DragPayload, HostRequest, PanelFrame, PanelSession, OPEN_PANEL_COMMAND, PANEL_ICON,
    PANEL_TITLE, PANEL_VIEW_TYPE,
};
pub use store::{MemoryStore, NoteStore};
pub use vault::FsVault;
