//! End-to-end scenarios for the `Project` file store + built-in cache
//! pipeline, driven through the public crate surface only (no access to
//! `Project`'s internals).
//!
//! ```bash
//! cargo test -p spxls-analysis --test edit_scenarios
//! ```

use std::sync::Arc;

use spxls_analysis::model::{Ast, Decl, FuncDecl, TypeInfo};
use spxls_analysis::ports::{
    DocumentationExtractor, Importer, ParseMode, Parser, TypeCheckRequest, TypeChecker,
};
use spxls_analysis::{Project, ProjectOptions};
use spxls_core::{Error, File, Result};

/// Parses source text into a single `Decl::Func` whose presence just
/// marks "non-empty source" ("`echo 100`" parses to body length 1).
struct WordCountParser;
impl Parser for WordCountParser {
    fn parse(&self, _path: &str, bytes: &[u8], _mode: ParseMode) -> (Option<Ast>, Option<Error>) {
        let text = String::from_utf8_lossy(bytes);
        let words: Vec<&str> = text.split_whitespace().collect();
        let body_len = if words.is_empty() { 0 } else { 1 };
        let tree = Ast {
            package_name: Some("main".into()),
            decls: (0..body_len)
                .map(|i| {
                    Decl::Func(FuncDecl {
                        name: format!("stmt{i}"),
                        receiver: None,
                        params: vec![],
                        results: vec![],
                        body: vec![],
                    })
                })
                .collect(),
        };
        (Some(tree), None)
    }
}

struct NoopTypeChecker;
impl TypeChecker for NoopTypeChecker {
    fn check(
        &self,
        _request: TypeCheckRequest<'_>,
        _importer: &dyn Importer,
        _on_error: &mut dyn FnMut(String),
    ) -> (TypeInfo, Option<Error>) {
        (TypeInfo::default(), None)
    }
}

struct NoopImporter;
impl Importer for NoopImporter {
    fn import(&self, path: &str) -> Result<Arc<spxls_analysis::model::Package>> {
        Err(Error::not_found(path))
    }
}

struct NoopDocs;
impl DocumentationExtractor for NoopDocs {
    fn extract(&self, _package_path: &str, _package_name: Option<&str>) -> String {
        String::new()
    }
}

fn ports() -> spxls_analysis::ports::Ports {
    spxls_analysis::ports::Ports {
        parser: Box::new(WordCountParser),
        type_checker: Box::new(NoopTypeChecker),
        importer: Box::new(NoopImporter),
        doc_extractor: Box::new(NoopDocs),
    }
}

/// `main.spx = "echo 100"`: the first AST request returns a tree with
/// body length 1, a second request returns the identical cached object,
/// and after the file is replaced the next request returns a
/// *different* tree object whose body still has length 1.
#[test]
fn cache_hit_then_miss_after_edit() {
    let project = Project::new(
        "demo",
        ports(),
        ProjectOptions::default(),
        [("main.spx".to_string(), File::from_text("echo 100", 0, 0))],
    );

    let first = project.get_ast("main.spx").unwrap();
    assert_eq!(first.tree.as_ref().unwrap().decls.len(), 1);

    let again = project.get_ast("main.spx").unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    project.put("main.spx", File::from_text("echo 200", 0, 1));
    let after_edit = project.get_ast("main.spx").unwrap();
    assert!(!Arc::ptr_eq(&first, &after_edit));
    assert_eq!(after_edit.tree.as_ref().unwrap().decls.len(), 1);
}

/// Renaming a file preserves its content while invalidating the caches
/// keyed on the old path.
#[test]
fn rename_preserves_content_and_invalidates_caches() {
    let project = Project::new(
        "demo",
        ports(),
        ProjectOptions::default(),
        [("main.spx".to_string(), File::from_text("echo 100", 0, 0))],
    );

    let a1 = project.get_ast("main.spx").unwrap();
    project.rename("main.spx", "foo.spx").unwrap();

    let a2 = project.get_ast("foo.spx").unwrap();
    assert!(!Arc::ptr_eq(&a1, &a2));
    assert_eq!(
        a1.tree.as_ref().unwrap().decls.len(),
        a2.tree.as_ref().unwrap().decls.len()
    );

    assert!(matches!(
        project.get_ast("main.spx"),
        Err(Error::NotFound { .. })
    ));
}

/// A bulk update at the same timestamp as the file already held is a
/// no-op; one at a later timestamp wins.
#[test]
fn bulk_update_respects_legacy_timestamp() {
    let project = Project::new(
        "demo",
        ports(),
        ProjectOptions::default(),
        [("main.spx".to_string(), File::from_text("echo 200", 1_000, 0))],
    );

    project.update_bulk([(
        "main.spx".to_string(),
        File::from_text("echo 999", 1_000, 0),
    )]);
    assert_eq!(project.get("main.spx").unwrap().text_lossy(), "echo 200");

    project.update_bulk([(
        "main.spx".to_string(),
        File::from_text("echo 300", 1_000 + 3_600, 0),
    )]);
    assert_eq!(project.get("main.spx").unwrap().text_lossy(), "echo 300");
}
