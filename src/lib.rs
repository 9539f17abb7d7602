// Library root
// -----------
// The binary (`main.rs`) wires these modules into the interactive CLI.
//
// Module responsibilities:
// - `api`: request/reply model, the `Transport` seam and the blocking
//   reqwest client behind it.
// - `config`: endpoints, timeouts, delays and output path, from the
//   environment with defaults.
// - `disk`: cloud drive calls (folders, remote-URL uploads, operations).
// - `images`: cat and dog image fetchers plus file name cleaning.
// - `manifest`: upload loop and the `results.json` writer.
// - `ui`: terminal menu flows that tie the rest together.
pub mod api;
pub mod config;
pub mod disk;
pub mod images;
pub mod manifest;
pub mod ui;
