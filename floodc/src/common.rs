//! Progress reporting and Ctrl+C handling, generalizing `geoc::common::for_tile_in_output`'s
//! double-press-to-force-quit pattern from "per-tile dataset generation" to "one pipeline
//! run with scratch artifacts worth preserving on interrupt".

use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc,
};

/// Installs a Ctrl+C handler: the first press requests graceful shutdown (scratch
/// artifacts are preserved instead of cleaned up); a second press exits immediately.
pub fn install_ctrlc_handler() -> Arc<AtomicBool> {
	let cancelled = Arc::new(AtomicBool::new(false));
	let handler_flag = cancelled.clone();

	let _ = ctrlc::set_handler(move || {
		if handler_flag.swap(true, Ordering::AcqRel) {
			std::process::exit(1);
		}
		eprintln!("\nFinishing up, press Ctrl+C again to exit immediately (scratch artifacts will be kept)");
	});

	cancelled
}

/// A simple stage progress line, printed the way `geoc::common::for_tile_in_output`
/// reported tile counts (`print!("\r{done}/{total}")`).
pub fn report_stage(stage: &str) {
	use std::io::Write;
	print!("\r{stage}...");
	let _ = std::io::stdout().flush();
}
