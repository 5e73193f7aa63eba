//! Recovers full path text by joining the known text of each record's
//! structural checksums, and removes recovered text that cannot be right.

use std::collections::BTreeSet;

use crate::archive::ArcFile;
use crate::error::{ConsistencyWarning, WarningKind};
use crate::hash::HashKey;
use crate::primary::PrimaryTable;
use crate::progress::{NoProgress, Progress};
use crate::registry::HashRegistry;
use crate::secondary::SecondaryTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconstructOptions {
    /// Upper bound on passes when looking for a fixed point.
    pub max_passes: usize,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        ReconstructOptions { max_passes: 64 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconstructStats {
    pub passes: usize,
    pub discovered: usize,
    /// The last pass discovered nothing.
    pub converged: bool,
}

/// How a primary-table file's path is assembled from its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathGrammar {
    /// `parent` + `name`; the parent carries its own trailing `/`.
    ParentName,
    /// `name/parent/extension`.
    NameParentExtension,
}

impl PathGrammar {
    fn fields(self, path: &PathFields) -> [HashKey; 3] {
        match self {
            PathGrammar::ParentName => [path.parent, path.name, HashKey::EMPTY],
            PathGrammar::NameParentExtension => [
                path.name,
                path.parent,
                path.extension.unwrap_or(HashKey::EMPTY),
            ],
        }
    }

    /// `ParentName` parents end in `/` already.
    fn separator(self) -> &'static str {
        match self {
            PathGrammar::ParentName => "",
            PathGrammar::NameParentExtension => "/",
        }
    }
}

/// The checksums of one record that describe a path.
#[derive(Debug, Clone, Copy)]
struct PathFields {
    path: HashKey,
    parent: HashKey,
    name: HashKey,
    extension: Option<HashKey>,
    /// Parent text ends in `/` and the path is `parent` + `name`.
    trailing_slash: bool,
}

/// Joins the text of `fields` with `separator`. Empty checksums are skipped;
/// any other field without text makes the join impossible.
fn synthesize(registry: &HashRegistry, fields: &[HashKey], separator: &str) -> Option<String> {
    let mut full = String::new();

    for &field in fields {
        if field.is_empty() {
            continue;
        }

        let text = registry.text(field)?;
        if !full.is_empty() {
            full.push_str(separator);
        }
        full.push_str(text);
    }

    Some(full).filter(|x| !x.is_empty())
}

fn file_name(text: &str) -> &str {
    match text.rfind('/') {
        Some(i) => &text[i + 1..],
        None => text,
    }
}

/// Text after the last `.` of the final component, or `""`.
fn extension_of(text: &str) -> &str {
    let name = file_name(text);
    match name.rfind('.') {
        Some(i) => &name[i + 1..],
        None => "",
    }
}

fn is_invalid_string(text: &str) -> bool {
    text.contains("./")
        || text.contains("//")
        || text.contains("..")
        || text.contains("/.")
        || text.ends_with('.')
}

struct Finding {
    kind: WarningKind,
    key: HashKey,
    text: String,
    evict: bool,
}

pub struct Reconstructor<'a> {
    primary: &'a PrimaryTable,
    secondary: &'a SecondaryTable,
    grammar: Option<PathGrammar>,
}

impl<'a> Reconstructor<'a> {
    pub fn new<R>(arc: &'a ArcFile<R>) -> Reconstructor<'a> {
        Reconstructor::from_tables(&arc.primary, &arc.secondary)
    }

    pub fn from_tables(
        primary: &'a PrimaryTable,
        secondary: &'a SecondaryTable,
    ) -> Reconstructor<'a> {
        Reconstructor {
            primary,
            secondary,
            grammar: None,
        }
    }

    /// Fixes the grammar used for primary-table files instead of trying both.
    pub fn with_grammar(mut self, grammar: Option<PathGrammar>) -> Self {
        self.grammar = grammar;
        self
    }

    #[inline(always)]
    pub fn grammar(&self) -> Option<PathGrammar> {
        self.grammar
    }

    /// Picks the grammar that reproduces the most stored file paths among
    /// files whose fields are all known. `None` without a clear winner.
    pub fn detect_grammar(&self, registry: &HashRegistry) -> Option<PathGrammar> {
        let mut parent_name = 0usize;
        let mut name_parent_extension = 0usize;

        for file in self.primary.files() {
            let fields = file_fields(file);
            for (grammar, count) in [
                (PathGrammar::ParentName, &mut parent_name),
                (PathGrammar::NameParentExtension, &mut name_parent_extension),
            ] {
                let candidate =
                    synthesize(registry, &grammar.fields(&fields), grammar.separator());
                if let Some(candidate) = candidate {
                    if registry.is_known(file.path) && HashKey::of(&candidate) == file.path {
                        *count += 1;
                    }
                }
            }
        }

        tracing::debug!(parent_name, name_parent_extension, "path grammar evidence");

        match parent_name.cmp(&name_parent_extension) {
            std::cmp::Ordering::Greater => Some(PathGrammar::ParentName),
            std::cmp::Ordering::Less => Some(PathGrammar::NameParentExtension),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Detects and stores the grammar, keeping the current one when the
    /// evidence is inconclusive.
    pub fn detect(mut self, registry: &HashRegistry) -> Self {
        if let Some(grammar) = self.detect_grammar(registry) {
            self.grammar = Some(grammar);
        }
        self
    }

    /// One pass over every record whose path text is unknown. Returns the
    /// number of discoveries.
    pub fn reconstruct_pass(&self, registry: &mut HashRegistry) -> usize {
        let mut found = 0;

        for dir in self.primary.directories() {
            found += try_join(registry, dir.path, &[dir.parent, dir.name], "/");
        }

        let grammars: &[PathGrammar] = match &self.grammar {
            Some(grammar) => std::slice::from_ref(grammar),
            None => &[PathGrammar::ParentName, PathGrammar::NameParentExtension],
        };
        for file in self.primary.files() {
            let fields = file_fields(file);
            for grammar in grammars {
                let parts = grammar.fields(&fields);
                found += try_join(registry, file.path, &parts, grammar.separator());
            }
        }

        for dir in self.secondary.directories() {
            found += try_join(registry, dir.path, &[dir.parent, dir.name], "/");
        }

        for entry in self.secondary.entries() {
            found += try_join(registry, entry.path, &[entry.parent, entry.name], "/");
        }

        found
    }

    pub fn run(&self, registry: &mut HashRegistry, options: ReconstructOptions) -> ReconstructStats {
        self.run_with_progress(registry, options, &mut NoProgress)
    }

    /// Repeats [`Reconstructor::reconstruct_pass`] until a pass discovers
    /// nothing or `max_passes` is reached.
    pub fn run_with_progress(
        &self,
        registry: &mut HashRegistry,
        options: ReconstructOptions,
        progress: &mut dyn Progress,
    ) -> ReconstructStats {
        let mut stats = ReconstructStats::default();
        progress.set_total(options.max_passes as u64);

        while stats.passes < options.max_passes {
            let found = self.reconstruct_pass(registry);
            stats.passes += 1;
            stats.discovered += found;
            progress.report_add(1);

            tracing::debug!(pass = stats.passes, found, "reconstruction pass");

            if found == 0 {
                stats.converged = true;
                break;
            }
        }

        stats
    }

    /// Distinct extension text of primary-table files.
    pub fn known_extensions(&self, registry: &HashRegistry) -> Vec<String> {
        self.primary
            .files()
            .iter()
            .filter_map(|x| registry.meaningful_text(x.extension))
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Reports inconsistent text without changing the dictionary.
    pub fn find_inconsistent_entries(&self, registry: &HashRegistry) -> Vec<ConsistencyWarning> {
        self.records()
            .flat_map(|record| inspect(registry, &record))
            .map(|x| ConsistencyWarning {
                kind: x.kind,
                key: x.key,
                text: x.text,
                evicted: false,
            })
            .collect()
    }

    /// Checks every record and evicts text that is structurally impossible.
    /// Later records see the effect of earlier evictions.
    pub fn prune_inconsistent_entries(
        &self,
        registry: &mut HashRegistry,
    ) -> Vec<ConsistencyWarning> {
        let mut warnings = Vec::new();

        for record in self.records() {
            for finding in inspect(registry, &record) {
                let evicted = finding.evict && registry.evict(finding.key).is_some();

                tracing::warn!(
                    kind = ?finding.kind,
                    key = %finding.key,
                    evicted,
                    "{}",
                    finding.text
                );

                warnings.push(ConsistencyWarning {
                    kind: finding.kind,
                    key: finding.key,
                    text: finding.text,
                    evicted,
                });
            }
        }

        warnings
    }

    fn records(&self) -> impl Iterator<Item = PathFields> + '_ {
        let primary_dirs = self.primary.directories().iter().map(|x| PathFields {
            path: x.path,
            parent: x.parent,
            name: x.name,
            extension: None,
            trailing_slash: false,
        });
        let primary_files = self.primary.files().iter().map(file_fields);
        let entries = self.secondary.entries().iter().map(|x| PathFields {
            path: x.path,
            parent: x.parent,
            name: x.name,
            extension: Some(x.extension),
            trailing_slash: false,
        });
        let secondary_dirs = self.secondary.directories().iter().map(|x| PathFields {
            path: x.path,
            parent: x.parent,
            name: x.name,
            extension: None,
            trailing_slash: false,
        });

        primary_dirs
            .chain(primary_files)
            .chain(entries)
            .chain(secondary_dirs)
    }
}

fn file_fields(file: &crate::primary::FileRecord) -> PathFields {
    PathFields {
        path: file.path,
        parent: file.parent,
        name: file.name,
        extension: Some(file.extension),
        trailing_slash: true,
    }
}

fn try_join(
    registry: &mut HashRegistry,
    path: HashKey,
    fields: &[HashKey],
    separator: &str,
) -> usize {
    if path.is_empty() || registry.is_known(path) {
        return 0;
    }

    let discovery = synthesize(registry, fields, separator).and_then(|x| registry.probe(&x));
    match discovery {
        Some(discovery) => registry.learn(discovery) as usize,
        None => 0,
    }
}

fn inspect(registry: &HashRegistry, record: &PathFields) -> Vec<Finding> {
    let owned = |key: HashKey| registry.meaningful_text(key).map(str::to_string);
    let path = owned(record.path);
    let parent = owned(record.parent);
    let name = owned(record.name);
    let extension = record.extension.and_then(owned);

    let mut findings = Vec::new();
    let mut report = |kind, key, text: &str, evict| {
        findings.push(Finding {
            kind,
            key,
            text: text.to_string(),
            evict,
        })
    };

    for (key, text) in [
        (record.path, &path),
        (record.name, &name),
        (record.parent, &parent),
        (record.extension.unwrap_or(HashKey::EMPTY), &extension),
    ] {
        if let Some(text) = text {
            if is_invalid_string(text) {
                report(WarningKind::InvalidString, key, text, true);
            }
        }
    }

    if let Some(parent) = &parent {
        if record.trailing_slash && !parent.ends_with('/') {
            report(WarningKind::MissingTrailingSlash, record.parent, parent, true);
        }
    }

    if let Some(extension) = &extension {
        if let Some(name) = &name {
            if extension_of(name) != extension {
                report(WarningKind::ExtensionMismatch, record.name, name, true);
            }
        }
        if let Some(path) = &path {
            if extension_of(path) != extension {
                report(WarningKind::ExtensionMismatch, record.path, path, true);
            }
        }
    }

    if let Some(path) = &path {
        let add = record.trailing_slash as isize;
        let cut = path.rfind('/').map_or(-1, |i| i as isize) + add;
        let cut = cut.min(path.len() as isize - 1).max(0) as usize;
        let expected_parent = path.get(..cut).unwrap_or("");

        let parent_matches = HashKey::of(expected_parent) == record.parent;
        let name_matches = HashKey::of(file_name(path)) == record.name;

        if (!parent_matches || !name_matches)
            && record.parent.len() != 0
            && parent.as_deref() != Some("/")
        {
            report(WarningKind::ParentMismatch, record.path, path, true);
        }
    }

    if let (Some(path), Some(parent), Some(name)) = (&path, &parent, &name) {
        let separator = if record.trailing_slash { "" } else { "/" };
        if format!("{}{}{}", parent, separator, name) != *path && parent != "/" {
            report(WarningKind::JoinMismatch, record.path, path, false);
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Int24;
    use crate::primary::{DirectoryRecord, FileRecord};
    use crate::secondary::HierarchyDirectory;

    fn universe(strings: &[&str]) -> HashRegistry {
        HashRegistry::new(strings.iter().map(|x| HashKey::of(x)).collect())
    }

    #[test]
    fn joins_parent_and_name() {
        let mut secondary = SecondaryTable::default();
        secondary.directories.push(HierarchyDirectory {
            path: HashKey::of("abc/def"),
            parent: HashKey::of("abc"),
            name: HashKey::of("def"),
            child_directory_count: Int24::new(0),
            ..Default::default()
        });
        let primary = PrimaryTable::default();

        let mut registry = universe(&["abc/def", "abc", "def"]);
        registry.register_seed_dictionary(["abc", "def"]);

        let r = Reconstructor::from_tables(&primary, &secondary);
        assert_eq!(r.reconstruct_pass(&mut registry), 1);
        assert_eq!(registry.text(HashKey::of("abc/def")), Some("abc/def"));
        assert_eq!(r.reconstruct_pass(&mut registry), 0);
    }

    #[test]
    fn empty_field_does_not_block_and_unknown_does() {
        let mut primary = PrimaryTable::default();
        primary.directories.push(DirectoryRecord {
            path: HashKey::of("fighter"),
            parent: HashKey::EMPTY,
            name: HashKey::of("fighter"),
            ..Default::default()
        });
        primary.directories.push(DirectoryRecord {
            path: HashKey::of("x/fighter"),
            parent: HashKey::of("x"),
            name: HashKey::of("fighter"),
            ..Default::default()
        });
        let secondary = SecondaryTable::default();

        let mut registry = universe(&["fighter", "x/fighter"]);
        registry.register_seed_dictionary(["fighter"]);
        let r = Reconstructor::from_tables(&primary, &secondary);
        // "fighter" is already known; "x" is not.
        assert_eq!(r.reconstruct_pass(&mut registry), 0);
    }

    #[test]
    fn fixed_point_converges() {
        let mut primary = PrimaryTable::default();
        for (path, parent, name) in [
            ("a/b/c", "a/b", "c"),
            ("a/b", "a", "b"),
        ] {
            primary.directories.push(DirectoryRecord {
                path: HashKey::of(path),
                parent: HashKey::of(parent),
                name: HashKey::of(name),
                ..Default::default()
            });
        }
        let secondary = SecondaryTable::default();
        let mut registry = universe(&["a/b/c", "a/b", "a", "b", "c"]);
        registry.register_seed_dictionary(["a", "b", "c"]);

        let r = Reconstructor::from_tables(&primary, &secondary);
        let stats = r.run(&mut registry, ReconstructOptions::default());
        assert!(stats.converged);
        assert_eq!(stats.discovered, 2);
        assert_eq!(r.reconstruct_pass(&mut registry), 0);
    }

    fn file(path: &str, parent: &str, name: &str, ext: &str) -> FileRecord {
        FileRecord {
            path: HashKey::of(path),
            parent: HashKey::of(parent),
            name: HashKey::of(name),
            extension: HashKey::of(ext),
            ..Default::default()
        }
    }

    #[test]
    fn grammar_detection() {
        let mut primary = PrimaryTable::default();
        primary.files.push(file(
            "fighter/mario/model.numdlb",
            "fighter/mario/",
            "model.numdlb",
            "numdlb",
        ));
        let secondary = SecondaryTable::default();
        let mut registry = universe(&[]);
        registry.register_seed_dictionary([
            "fighter/mario/model.numdlb",
            "fighter/mario/",
            "model.numdlb",
            "numdlb",
        ]);

        let r = Reconstructor::from_tables(&primary, &secondary);
        assert_eq!(r.detect_grammar(&registry), Some(PathGrammar::ParentName));
        assert_eq!(r.known_extensions(&registry), vec!["numdlb".to_string()]);
    }

    #[test]
    fn file_path_from_trailing_slash_parent() {
        let mut primary = PrimaryTable::default();
        primary.files.push(file(
            "fighter/mario/model.numdlb",
            "fighter/mario/",
            "model.numdlb",
            "numdlb",
        ));
        let secondary = SecondaryTable::default();
        let mut registry = universe(&["fighter/mario/model.numdlb"]);
        registry.register_seed_dictionary(["fighter/mario/", "model.numdlb", "numdlb"]);

        let r = Reconstructor::from_tables(&primary, &secondary)
            .with_grammar(Some(PathGrammar::ParentName));
        assert_eq!(r.reconstruct_pass(&mut registry), 1);
        assert!(r.find_inconsistent_entries(&registry).is_empty());
    }

    #[test]
    fn directory_joins_always_insert_a_separator() {
        let mut secondary = SecondaryTable::default();
        for (path, parent, name) in [("//ui", "/", "ui"), ("ui", "/", "ui")] {
            secondary.directories.push(HierarchyDirectory {
                path: HashKey::of(path),
                parent: HashKey::of(parent),
                name: HashKey::of(name),
                ..Default::default()
            });
        }
        let primary = PrimaryTable::default();
        let mut registry = universe(&["//ui", "ui", "/"]);
        registry.register_seed_dictionary(["/", "ui"]);

        let r = Reconstructor::from_tables(&primary, &secondary);
        assert_eq!(r.reconstruct_pass(&mut registry), 1);
        assert_eq!(registry.text(HashKey::of("//ui")), Some("//ui"));
    }

    #[test]
    fn name_parent_extension_join() {
        let mut primary = PrimaryTable::default();
        primary
            .files
            .push(file("model/fighter/mario/numdlb", "fighter/mario", "model", "numdlb"));
        let secondary = SecondaryTable::default();
        let mut registry = universe(&["model/fighter/mario/numdlb"]);
        registry.register_seed_dictionary(["fighter/mario", "model", "numdlb"]);

        let r = Reconstructor::from_tables(&primary, &secondary)
            .with_grammar(Some(PathGrammar::NameParentExtension));
        assert_eq!(r.reconstruct_pass(&mut registry), 1);
        assert!(registry.is_known(HashKey::of("model/fighter/mario/numdlb")));
    }

    #[test]
    fn prune_evicts_impossible_text() {
        let mut primary = PrimaryTable::default();
        primary.files.push(file("a/b.png", "a/", "b.png", "png"));
        let secondary = SecondaryTable::default();
        let mut registry = universe(&[]);
        // Wrong extension on the name, missing slash on a parent and an
        // invalid string.
        registry.register_seed_dictionary(["a/b.png", "png"]);
        let mut bad_primary = PrimaryTable::default();
        bad_primary.files.push(FileRecord {
            path: HashKey::of("a/b.png"),
            parent: HashKey::of("a"),
            name: HashKey::of("b.jpg"),
            extension: HashKey::of("png"),
            ..Default::default()
        });
        registry.register_seed_dictionary(["a", "b.jpg", "x/../y"]);
        bad_primary.directories.push(DirectoryRecord {
            path: HashKey::of("x/../y"),
            ..Default::default()
        });

        let good = Reconstructor::from_tables(&primary, &secondary);
        assert!(good.find_inconsistent_entries(&registry).is_empty());

        let bad = Reconstructor::from_tables(&bad_primary, &secondary);
        let warnings = bad.prune_inconsistent_entries(&mut registry);
        let kinds: Vec<_> = warnings.iter().map(|x| x.kind).collect();

        assert!(kinds.contains(&WarningKind::InvalidString));
        assert!(kinds.contains(&WarningKind::MissingTrailingSlash));
        assert!(kinds.contains(&WarningKind::ExtensionMismatch));
        assert!(kinds.contains(&WarningKind::ParentMismatch));
        assert!(!registry.is_known(HashKey::of("x/../y")));
        assert!(!registry.is_known(HashKey::of("a")));
        assert!(!registry.is_known(HashKey::of("b.jpg")));
        assert!(!registry.is_known(HashKey::of("a/b.png")));
        assert!(registry.is_known(HashKey::of("png")));
    }

    #[test]
    fn extension_helpers() {
        assert_eq!(extension_of("a.b/c.nutexb"), "nutexb");
        assert_eq!(extension_of("a.b/c"), "");
        assert_eq!(file_name("a/b/c.png"), "c.png");
        assert!(is_invalid_string("a//b"));
        assert!(is_invalid_string("a."));
        assert!(!is_invalid_string("a/b.c"));
    }
}
