use arc_format::extract::extract_streams;
use arc_format::NoProgress;

use crate::cli::StreamsArgs;
use crate::error::{Error, Result};
use crate::util::{format_size, load_registry, open_archive, BarProgress};

pub fn run(args: StreamsArgs) -> Result<()> {
    let mut arc = open_archive(&args.archive.archive)?;
    let registry = load_registry(&arc, args.archive.dictionary.as_deref())?;
    let output_path = args.output.unwrap_or_else(|| ".".into());

    let stats = if args.quiet {
        extract_streams(&mut arc, &registry, &output_path, &mut NoProgress)
    } else {
        let mut progress = BarProgress::new("Streams");
        let stats = extract_streams(&mut arc, &registry, &output_path, &mut progress);
        progress.finish();
        stats
    }
    .map_err(|source| Error::Extract { source })?;

    if !args.quiet {
        println!(
            "Extracted {} streams ({}) to {}",
            stats.files_extracted,
            format_size(stats.bytes_written),
            output_path.display(),
        );
    }
    if stats.failures > 0 {
        eprintln!("WARNING: {} streams could not be extracted", stats.failures);
    }

    Ok(())
}
