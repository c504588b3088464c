//! Machine-readable probes of the dynamic loader and the relay's signal range.

use jrebridge::Library;
use jrebridge_core::signal::{self, NSIG};
use serde::{Deserialize, Serialize};

/// Outcome of resolving one symbol in one library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub library: String,
    pub symbol: String,
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Open `library` the way the launcher does and look up `symbol`.
#[must_use]
pub fn probe(library: &str, symbol: &str) -> ProbeReport {
    let outcome = Library::open_launcher(library).and_then(|lib| lib.symbol(symbol).map(|_| ()));
    ProbeReport {
        library: library.to_string(),
        symbol: symbol.to_string(),
        resolved: outcome.is_ok(),
        error: outcome.err().map(|err| err.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRow {
    pub number: i32,
    pub name: String,
    pub catchable: bool,
}

/// Every valid signal number with whether the relay can take it over.
#[must_use]
pub fn signal_table() -> Vec<SignalRow> {
    (1..NSIG as i32)
        .map(|number| SignalRow {
            number,
            name: signal::signal_name(number).to_string(),
            catchable: signal::catchable_signal(number),
        })
        .collect()
}
