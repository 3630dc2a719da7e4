use std::collections::{BTreeSet, HashMap};

use crate::bookmap::Bookmap;
use crate::error::{Error, Result};
use crate::model::{APPENDIX_UNIT, FRONT_MATTER_CHAPTER, Failures, RunOptions, is_blank};
use crate::service::ContentService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollectionId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    Collection(CollectionId),
    /// Index into [`Bookmap::modules`].
    Module(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub title: String,
    pub id: String,
    pub parent: Option<CollectionId>,
    pub members: Vec<Member>,
}

/// Book → unit → chapter hierarchy as built on the destination server.
#[derive(Debug, Clone)]
pub struct CollectionTree {
    nodes: Vec<Collection>,
}

impl CollectionTree {
    pub fn new(title: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            nodes: vec![Collection {
                title: title.into(),
                id: id.into(),
                parent: None,
                members: Vec::new(),
            }],
        }
    }

    #[must_use]
    pub fn root(&self) -> CollectionId {
        CollectionId(0)
    }

    #[must_use]
    pub fn get(&self, id: CollectionId) -> &Collection {
        &self.nodes[id.0]
    }

    pub fn add_subcollection(
        &mut self,
        parent: CollectionId,
        title: impl Into<String>,
        id: impl Into<String>,
    ) -> CollectionId {
        let child = CollectionId(self.nodes.len());
        self.nodes.push(Collection {
            title: title.into(),
            id: id.into(),
            parent: Some(parent),
            members: Vec::new(),
        });
        self.nodes[parent.0].members.push(Member::Collection(child));
        child
    }

    pub fn add_module(&mut self, parent: CollectionId, module: usize) {
        self.nodes[parent.0].members.push(Member::Module(module));
    }

    /// Remote ids from the root down to `id`, joined with `/`.
    #[must_use]
    pub fn path(&self, id: CollectionId) -> String {
        let mut ids = vec![self.get(id).id.as_str()];
        let mut next = self.get(id).parent;
        while let Some(parent) = next {
            ids.push(self.get(parent).id.as_str());
            next = self.get(parent).parent;
        }
        ids.reverse();
        ids.join("/")
    }
}

/// Whether a unit number names a real unit (not appendix, not missing).
#[must_use]
pub fn is_unit(unit_number: &str) -> bool {
    !is_blank(unit_number) && unit_number != APPENDIX_UNIT
}

/// Front matter and appendix/unit-less chapters attach straight to the book.
#[must_use]
pub fn gets_chapter_subcollection(chapter_number: &str, unit_number: &str) -> bool {
    chapter_number != FRONT_MATTER_CHAPTER && is_unit(unit_number)
}

/// Distinct `(unit number, unit title)` pairs of the active chapters, sorted.
#[must_use]
pub fn units_of(bookmap: &Bookmap) -> Vec<(String, String)> {
    bookmap
        .modules
        .iter()
        .filter(|module| bookmap.is_active_chapter(&module.chapter_number))
        .filter(|module| is_unit(&module.unit_number))
        .map(|module| (module.unit_number.clone(), module.unit_title.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Creates the book collection, its unit and chapter subcollections, adds the
/// placed modules, and publishes the book when asked.
///
/// Returns `Ok(None)` when nothing was built (dry run or the stage gave up
/// after recording a failure). Only fatal errors are returned as `Err`.
pub fn assemble(
    service: &dyn ContentService,
    bookmap: &mut Bookmap,
    options: &RunOptions,
    failures: &mut Failures,
) -> Result<Option<CollectionTree>> {
    let units = if options.units {
        units_of(bookmap)
    } else {
        Vec::new()
    };

    if options.dry_run {
        log_plan(bookmap, options, &units);
        return Ok(None);
    }

    let book_title = bookmap.book_title.clone();
    tracing::info!(book = %book_title, "creating collection");
    let root_id = match service.create_collection(&book_title) {
        Ok(id) => id,
        Err(err) => {
            failures.absorb(book_title, "creating collection", err)?;
            return Ok(None);
        }
    };
    let mut tree = CollectionTree::new(book_title.clone(), root_id);
    let root = tree.root();

    let mut unit_collections: HashMap<String, CollectionId> = HashMap::new();
    for (number, title) in &units {
        let unit_title = format!("Unit {number}. {title}");
        match service.add_subcollections(&tree.path(root), std::slice::from_ref(&unit_title)) {
            Ok(ids) => {
                let id = ids.into_iter().next().unwrap_or_default();
                let unit = tree.add_subcollection(root, unit_title, id);
                unit_collections.insert(number.clone(), unit);
            }
            Err(err) => {
                failures.absorb(unit_title, "creating subcollections", err)?;
                return Ok(None);
            }
        }
    }

    let workgroups = bookmap
        .workgroups
        .iter()
        .filter(|workgroup| bookmap.is_active_chapter(&workgroup.chapter_number))
        .cloned()
        .collect::<Vec<_>>();
    for workgroup in workgroups {
        let nests = gets_chapter_subcollection(&workgroup.chapter_number, &workgroup.unit_number);
        let parent = if options.units && nests {
            *unit_collections.get(&workgroup.unit_number).ok_or_else(|| {
                Error::Unrecoverable(format!(
                    "chapter {} belongs to unit {} which has no subcollection",
                    workgroup.chapter_number, workgroup.unit_number
                ))
            })?
        } else {
            root
        };

        let module_parent = if nests {
            match service.add_subcollections(
                &tree.path(parent),
                std::slice::from_ref(&workgroup.chapter_title),
            ) {
                Ok(ids) => {
                    let id = ids.into_iter().next().unwrap_or_default();
                    tree.add_subcollection(parent, workgroup.chapter_title.clone(), id)
                }
                Err(err) => {
                    failures.absorb(workgroup.title, "creating subcollections", err)?;
                    return Ok(None);
                }
            }
        } else {
            root
        };

        tracing::debug!(
            chapter = %workgroup.chapter_number,
            collection = %tree.path(module_parent),
            modules = workgroup.modules.len(),
            "adding modules to collection"
        );
        let collection_path = tree.path(module_parent);
        for &idx in &workgroup.modules {
            let module = &mut bookmap.modules[idx];
            if !module.valid {
                tracing::debug!(module = %module.full_title(), "skipping invalid module");
                continue;
            }
            match service.add_module_to_collection(&collection_path, &module.destination_id) {
                Ok(()) => tree.add_module(module_parent, idx),
                Err(err) => {
                    module.valid = false;
                    failures.absorb(module.full_title(), "adding module to collection", err)?;
                }
            }
        }
    }

    if options.publish_collection {
        tracing::info!(collection = %tree.path(root), "publishing collection");
        if let Err(err) = service.publish_collection(&tree.path(root)) {
            failures.absorb(book_title, "publishing collection", err)?;
        }
    }

    Ok(Some(tree))
}

fn log_plan(bookmap: &Bookmap, options: &RunOptions, units: &[(String, String)]) {
    for (number, title) in units {
        tracing::info!(unit = %number, title = %title, "dry run: would create unit subcollection");
    }
    for workgroup in &bookmap.workgroups {
        if !bookmap.is_active_chapter(&workgroup.chapter_number) {
            continue;
        }
        let nests = gets_chapter_subcollection(&workgroup.chapter_number, &workgroup.unit_number);
        let under_unit = options.units && nests;
        tracing::info!(
            chapter = %workgroup.chapter_number,
            chapter_subcollection = nests,
            under_unit,
            modules = workgroup.modules.len(),
            "dry run: would add chapter to collection"
        );
    }
}
