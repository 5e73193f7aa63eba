use arc_format::{FsTree, Reconstructor};

use crate::cli::ValidateArgs;
use crate::error::{Error, Result};
use crate::util::{load_registry, open_archive};

pub fn run(args: ValidateArgs) -> Result<()> {
    let arc = open_archive(&args.archive.archive)?;
    let registry = load_registry(&arc, args.archive.dictionary.as_deref())?;

    let tree = FsTree::from_archive(&arc, &registry).map_err(|source| Error::BuildTree { source })?;
    let reconstructor = Reconstructor::new(&arc);

    let warnings = tree
        .warnings()
        .iter()
        .cloned()
        .chain(tree.validate())
        .chain(reconstructor.find_inconsistent_entries(&registry))
        .collect::<Vec<_>>();

    for warning in &warnings {
        println!("{:?}\t{}\t{}", warning.kind, warning.key, warning.text);
    }

    println!("Nodes: {}", tree.len());
    println!("Known checksums: {}", registry.coverage());
    println!("Known file paths: {}", arc.file_path_coverage(&registry));

    if !warnings.is_empty() {
        eprintln!("WARNING: {} inconsistencies found", warnings.len());
        std::process::exit(1);
    }

    Ok(())
}
