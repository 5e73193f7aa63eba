use std::fs::File;
use std::io::{BufWriter, Write};

use arc_format::{FsTree, HashRegistry, ReconstructOptions, Reconstructor};

use crate::cli::CrackArgs;
use crate::error::{Error, Result};
use crate::util::{load_registry, open_archive, BarProgress};

pub fn run(args: CrackArgs) -> Result<()> {
    let arc = open_archive(&args.archive.archive)?;
    let mut registry = load_registry(&arc, args.archive.dictionary.as_deref())?;
    let options = ReconstructOptions {
        max_passes: args.max_passes,
    };

    let reconstructor = Reconstructor::new(&arc).detect(&registry);
    tracing::info!("File path grammar: {:?}", reconstructor.grammar());

    let mut progress = BarProgress::new("Reconstructing");
    let stats = reconstructor.run_with_progress(&mut registry, options, &mut progress);
    progress.finish();
    tracing::info!(
        "Reconstruction found {} strings in {} passes",
        stats.discovered,
        stats.passes
    );

    let discovered: Vec<String> = registry.new_strings().values().cloned().collect();
    let mut found = discovered
        .iter()
        .map(|line| registry.register_split_components(line))
        .sum::<usize>();

    let extensions = reconstructor.known_extensions(&registry);
    found += registry.register_with_extensions(&extensions) + registry.expand_templates();
    tracing::info!("Components, extensions and templates found {} strings", found);

    if let Some(len) = args.brute_force {
        let mut progress = BarProgress::new("Brute forcing");
        let found = registry.brute_force_with_progress(len, args.charset.clone(), &mut progress);
        progress.finish();
        tracing::info!("Brute force found {} strings", found.len());
    }

    if args.template_len > 0 {
        let templates = FsTree::from_archive(&arc, &registry)
            .map_err(|source| Error::BuildTree { source })?
            .search_templates();

        for (template, len) in templates.iter().filter(|(_, len)| *len <= args.template_len) {
            let mut progress = BarProgress::new(template);
            registry.fill_template_with_progress(template, *len, args.charset.clone(), &mut progress);
            progress.finish();
        }
    }

    reconstructor.run(&mut registry, options);

    if args.prune {
        let warnings = reconstructor.prune_inconsistent_entries(&mut registry);
        let evicted = warnings.iter().filter(|x| x.evicted).count();
        tracing::info!("Pruned {} strings ({} warnings)", evicted, warnings.len());
    }

    println!("New strings: {}", registry.new_strings().len());
    println!("Known checksums: {}", registry.coverage());
    println!("Known file paths: {}", arc.file_path_coverage(&registry));

    match &args.output {
        Some(path) => write_dictionary(&registry, path),
        None => {
            let mut strings: Vec<_> = registry.new_strings().values().collect();
            strings.sort();
            for s in strings {
                println!("{}", s);
            }
            Ok(())
        }
    }
}

fn write_dictionary(registry: &HashRegistry, path: &std::path::Path) -> Result<()> {
    let write_error = |source| Error::WriteOutput {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = BufWriter::new(File::create(path).map_err(write_error)?);
    let count = registry
        .write_dictionary(&mut writer)
        .map_err(write_error)?;
    writer.flush().map_err(write_error)?;

    tracing::info!("Wrote {} strings to {}", count, path.display());
    Ok(())
}
