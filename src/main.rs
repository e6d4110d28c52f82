// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for retasm.

fn main() {
    match retasm::cli::run() {
        Ok(reports) => {
            let mut errors = 0;
            for report in reports {
                for diag in report.diagnostics() {
                    eprintln!("{}", diag.format_with_context(Some(report.source_lines())));
                }
                errors += report.error_count();
            }
            if errors > 0 {
                std::process::exit(1);
            }
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
