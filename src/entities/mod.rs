// Entity Models
// The canonical entrant and the record mirrored into the rally database.

pub mod entrant;
pub mod mirror;

pub use entrant::{DraftPerson, Entrant, EntrantDraft, LegionStatus, Person};
pub use mirror::{MirrorPerson, MirrorRecord};
