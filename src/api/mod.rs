pub mod requests;

use crate::engine::Engine;
use crate::store::mysql::MySqlStore;

/// Concrete engine the HTTP surface runs against.
pub type AppEngine = Engine<MySqlStore>;
