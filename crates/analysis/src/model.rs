//! A minimal concrete shape for parsed source and type information.
//!
//! The real parser, type checker, importer and documentation extractor
//! are external ports (see [`crate::ports`]) the embedder supplies;
//! spxls does not implement Go+/XGo language semantics itself. This
//! module fixes just enough of a shape for those ports to hand results
//! through the cache fabric, and for the reference walker
//! (`spxls-classfile`) to traverse declarations and expressions by
//! name and span. An embedder adapts its native AST/type-checker output
//! into these types at the port boundary.

use std::collections::HashMap;

/// A half-open byte range within a single file, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Span { start, end }
    }
}

/// An identifier occurrence (a use-site or a defining name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

/// A named type reference, optionally behind a pointer or a slice.
///
/// Sufficient for the reference walker's "pointer-stripped"/"slice-
/// stripped" type comparisons without modeling a full type system.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub name: String,
    pub is_pointer: bool,
    pub is_slice: bool,
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef {
            name: name.into(),
            is_pointer: false,
            is_slice: false,
        }
    }

    pub fn pointer_stripped(&self) -> TypeRef {
        TypeRef {
            is_pointer: false,
            ..self.clone()
        }
    }

    pub fn slice_stripped(&self) -> TypeRef {
        TypeRef {
            is_slice: false,
            ..self.clone()
        }
    }
}

/// A unique identity for a resolved object (a variable, constant,
/// function, or type binding). Real embedders typically derive this
/// from their own symbol table; spxls treats it as an opaque, hashable
/// key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    StringLit(String),
    Ident(Ident),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        /// The receiver expression for a selector call (`recv.Method(...)`).
        receiver: Option<Box<Expr>>,
    },
    SliceLit(Vec<Expr>),
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    pub static_type: Option<TypeRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub name_span: Span,
    pub ty: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub name: String,
    pub ty: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncDecl {
    pub name: String,
    /// `Some` for a method, the (possibly pointer) receiver type.
    pub receiver: Option<TypeRef>,
    pub params: Vec<ParamDecl>,
    pub results: Vec<TypeRef>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Expr(Expr),
    Assign { lhs: Expr, rhs: Expr },
    /// `return a, b, ...`. Tracked separately from `Other` so the
    /// reference walker can pair each returned expression with the
    /// enclosing function's declared result type at that index (the
    /// "string literal occurs as a return value" case).
    Return(Vec<Expr>),
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstOrVarDecl {
    pub name: Ident,
    pub declared_type: Option<TypeRef>,
    /// Present when the declaration carries an initializer expression
    /// positioned at the same index.
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decl {
    Func(FuncDecl),
    Struct(StructType),
    ConstOrVar(ConstOrVarDecl),
}

impl Decl {
    pub fn name(&self) -> &str {
        match self {
            Decl::Func(f) => &f.name,
            Decl::Struct(s) => &s.name,
            Decl::ConstOrVar(v) => &v.name.name,
        }
    }
}

/// A single parsed file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ast {
    pub package_name: Option<String>,
    pub decls: Vec<Decl>,
}

/// A name-keyed scope of top-level declarations, as produced by the
/// type checker for a package.
#[derive(Debug, Clone, Default)]
pub struct PackageScope {
    pub decls: HashMap<String, Decl>,
}

impl PackageScope {
    pub fn lookup(&self, name: &str) -> Option<&Decl> {
        self.decls.get(name)
    }
}

/// A project-scope package: its import path, resolved name, and
/// top-level scope.
#[derive(Debug, Clone, Default)]
pub struct Package {
    pub path: String,
    pub name: String,
    pub scope: PackageScope,
}

/// The populated output of the type checker port: maps keyed by span
/// rather than by AST node identity, since spxls's mini AST has no
/// stable node handles of its own.
#[derive(Debug, Clone, Default)]
pub struct TypeInfo {
    pub expr_types: HashMap<Span, TypeRef>,
    pub defs: HashMap<Span, ObjectId>,
    pub uses: HashMap<Span, ObjectId>,
    pub selections: HashMap<Span, ObjectId>,
    pub implicits: HashMap<Span, ObjectId>,
    /// Reverse index `object -> defining identifier span`, built by the
    /// type-info builder (not the type checker port) in O(defs).
    pub defs_reverse: HashMap<ObjectId, Span>,
}

impl TypeInfo {
    /// Populate [`TypeInfo::defs_reverse`] from [`TypeInfo::defs`].
    pub fn build_reverse_index(&mut self) {
        self.defs_reverse = self
            .defs
            .iter()
            .map(|(span, obj)| (obj.clone(), *span))
            .collect();
    }
}

/// A diagnostic produced anywhere in the analysis or classfile layers:
/// resource index problems, reference-walker findings, and aggregated
/// per-file parse errors that the AST-package builder chose to surface
/// rather than drop (see the open-question resolution in `DESIGN.md`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub path: Option<String>,
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            path: None,
            span: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}
