use std::fs::File;
use std::io::{BufWriter, Write};

use arc_format::HashFilter;

use crate::cli::HashesArgs;
use crate::error::{Error, Result};
use crate::util::{load_registry, open_archive};

pub fn run(args: HashesArgs) -> Result<()> {
    let arc = open_archive(&args.archive.archive)?;
    let registry = load_registry(&arc, args.archive.dictionary.as_deref())?;

    let filter = if args.unknown {
        HashFilter::Unknown
    } else {
        HashFilter::All
    };

    let count = match &args.output {
        Some(path) => {
            let write_error = |source| Error::WriteOutput {
                path: path.clone(),
                source,
            };
            let mut writer = BufWriter::new(File::create(path).map_err(write_error)?);
            let count = registry
                .write_hashes(&mut writer, filter)
                .map_err(write_error)?;
            writer.flush().map_err(write_error)?;
            count
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            let count = registry
                .write_hashes(&mut writer, filter)
                .map_err(|source| Error::Stdout { source })?;
            writer.flush().map_err(|source| Error::Stdout { source })?;
            count
        }
    };

    tracing::info!("Wrote {} checksums", count);
    Ok(())
}
