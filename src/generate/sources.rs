//! @acp:module "Source Aggregation"
//! @acp:summary "Collect the source files of enabled modules, split by language and memory"
//! @acp:domain cli
//! @acp:layer service

use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::catalog::{Catalog, HarvardMode, Module};
use crate::project::ProjectDescriptor;

/// @acp:summary "Deduplicated source lists, one per build variable"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceLists {
    pub csrc: BTreeSet<String>,
    /// C sources compiled for program memory (harvard CPUs only)
    pub pcsrc: BTreeSet<String>,
    pub cppasrc: BTreeSet<String>,
    pub cxxsrc: BTreeSet<String>,
    pub asrc: BTreeSet<String>,
}

impl SourceLists {
    /// Fold program-memory sources into the C list
    pub fn merge_program_memory(&mut self) {
        let pcsrc = std::mem::take(&mut self.pcsrc);
        self.csrc.extend(pcsrc);
    }

    fn add(&mut self, found: FoundFiles, data: bool, program: bool) {
        if data {
            self.csrc.extend(found.c.iter().cloned());
        }
        if program {
            self.pcsrc.extend(found.c);
        }
        self.cppasrc.extend(found.cppa);
        self.cxxsrc.extend(found.cxx);
        self.asrc.extend(found.asm);
    }
}

/// `(data, program)` placement of a module's C sources. Modules without a
/// declared mode land in both memories.
fn memory_split(harvard: bool, mode: Option<HarvardMode>) -> (bool, bool) {
    if !harvard {
        return (true, false);
    }
    match mode.unwrap_or(HarvardMode::Both) {
        HarvardMode::Data => (true, false),
        HarvardMode::Both => (true, true),
        HarvardMode::Program => (false, true),
    }
}

/// Files found for one module or bare dependency name
#[derive(Debug, Default)]
struct FoundFiles {
    c: Vec<String>,
    cppa: Vec<String>,
    cxx: Vec<String>,
    asm: Vec<String>,
}

/// @acp:summary "Gather sources of every enabled module and its dependencies"
pub fn collect_sources(catalog: &mut Catalog, project: &ProjectDescriptor) -> SourceLists {
    let mut lists = SourceLists::default();
    let tags = project.cpu.file_tags();
    let harvard = project.cpu.is_harvard();
    let prefix = root_prefix(catalog.source_root());

    let enabled: Vec<Module> = catalog.enabled_modules().cloned().collect();

    for module in &enabled {
        let (data, program) = memory_split(harvard, module.harvard);
        let found = find_files(catalog, &module.name, &tags, &prefix);
        lists.add(found, data, program);

        for hw in module.hw.iter().filter(|f| f.ends_with(".c")) {
            let base = Path::new(hw)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| hw.clone());
            lists.csrc.insert(format!("{}/hw/{}", project.name, base));
        }

        // Bare file dependencies follow the memory model of the module pulling them in
        for dep in catalog.effective_dependencies(&module.name) {
            if catalog.is_module(&dep) {
                continue;
            }
            let found = find_files(catalog, &dep, &tags, &prefix);
            lists.add(found, data, program);
        }
    }

    let cpu = &project.cpu.sources;
    lists.csrc.extend(cpu.c.iter().map(|s| format!("{}/{}", prefix, s)));
    let pgm = cpu.pgm_c.iter().map(|s| format!("{}/{}", prefix, s));
    if harvard {
        lists.pcsrc.extend(pgm);
    } else {
        lists.csrc.extend(pgm);
    }
    lists.cppasrc.extend(cpu.cppa.iter().map(|s| format!("{}/{}", prefix, s)));
    lists.cxxsrc.extend(cpu.cxx.iter().map(|s| format!("{}/{}", prefix, s)));
    lists.asrc.extend(cpu.asm.iter().map(|s| format!("{}/{}", prefix, s)));

    debug!(
        "Collected {} C, {} program-memory C, {} asm sources",
        lists.csrc.len(),
        lists.pcsrc.len(),
        lists.cppasrc.len() + lists.asrc.len()
    );
    lists
}

/// Source paths are written relative to the project, where the tree is
/// expected under its own directory name
fn root_prefix(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| root.to_string_lossy().to_string())
}

/// `name.c`, `name_<tag>.c` and the assembly / C++ equivalents. A name that
/// already carries an extension is looked up as is.
fn find_files(catalog: &mut Catalog, name: &str, tags: &[String], prefix: &str) -> FoundFiles {
    let mut found = FoundFiles::default();
    let mut candidates: Vec<String> = Vec::new();
    if Path::new(name).extension().is_some() {
        candidates.push(name.to_string());
    } else {
        for ext in ["c", "S", "s", "cpp"] {
            candidates.push(format!("{}.{}", name, ext));
            for tag in tags {
                candidates.push(format!("{}_{}.{}", name, tag, ext));
            }
        }
    }

    for candidate in candidates {
        for rel in catalog.files().find_named(&candidate) {
            let path = format!("{}/{}", prefix, rel.to_string_lossy().replace('\\', "/"));
            match candidate.rsplit('.').next() {
                Some("c") => found.c.push(path),
                Some("S") => found.cppa.push(path),
                Some("s") => found.asm.push(path),
                Some("cpp") | Some("cc") | Some("cxx") => found.cxx.push(path),
                _ => {}
            }
        }
    }
    found
}
