use arc_format::extract::extract_files;
use arc_format::{ExtractOptions, NoProgress};

use crate::cli::ExtractArgs;
use crate::error::{Error, Result};
use crate::util::{format_size, load_registry, open_archive, BarProgress};

pub fn run(args: ExtractArgs) -> Result<()> {
    let mut arc = open_archive(&args.archive.archive)?;
    let registry = load_registry(&arc, args.archive.dictionary.as_deref())?;

    let output_path = args.output.unwrap_or_else(|| ".".into());
    let options = ExtractOptions {
        quarantine: args.quarantine,
        overwrite: !args.keep_existing,
    };

    let stats = if args.quiet {
        extract_files(&mut arc, &registry, &output_path, &options, &mut NoProgress)
    } else {
        let mut progress = BarProgress::new("Extracting");
        let stats = extract_files(&mut arc, &registry, &output_path, &options, &mut progress);
        progress.finish();
        stats
    }
    .map_err(|source| Error::Extract { source })?;

    if !args.quiet {
        println!(
            "Extracted {} files ({}) to {} in {:.1?}",
            stats.files_extracted,
            format_size(stats.bytes_written),
            output_path.display(),
            stats.elapsed,
        );
        if stats.skipped > 0 {
            println!("Skipped {} existing files", stats.skipped);
        }
    }

    if stats.failures > 0 {
        eprintln!(
            "WARNING: {} files could not be extracted ({} quarantined)",
            stats.failures, stats.quarantined
        );
    }

    Ok(())
}
