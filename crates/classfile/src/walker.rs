//! The reference walker: cross-references a project's source against
//! its resource index, producing de-duplicated resource references and
//! diagnostics.
//!
//! The walker runs in four phases sharing a single pass over the
//! project's AST package and type information:
//!
//! 1. Sprite type collection — every non-`main.spx` classfile names a
//!    candidate sprite type.
//! 2. Auto-binding inspection — fields on `Game` typed as a sprite are
//!    auto-bindings; every use-site of such a field is also recorded.
//! 3. Definition inspection — top-level const/var initializers are
//!    dispatched under their declared type.
//! 4. Expression inspection — every statement-level expression (string
//!    literal, identifier, or call) is dispatched against the resource-
//!    name aliases it names.
//!
//! None of this runs concurrently and nothing here is retained across
//! invocations — a fresh pass is built per call, matching the "no
//! shared mutable state across invocations" design note.

use std::collections::HashMap;

use spxls_analysis::model::{Decl, Diagnostic, Expr, ExprKind, FuncDecl, Span, Stmt, TypeRef};
use spxls_analysis::{AstPackageResult, Project};
use spxls_core::Result;

use crate::resource::{ResourceId, ResourceSet};

/// How a [`ResourceRef`] was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// A literal string occurring where a resource name was expected.
    StringLiteral,
    /// The defining identifier of a `Game` field typed as a sprite.
    AutoBinding,
    /// A use-site identifier referring to an auto-bound `Game` field.
    AutoBindingReference,
    /// An identifier resolving to a named string constant.
    ConstantReference,
}

/// One resource reference discovered by the walker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub id: ResourceId,
    pub kind: ReferenceKind,
    pub span: Span,
}

impl ResourceRef {
    fn dedup_key(&self) -> (String, ReferenceKind, u32, u32) {
        (self.id.uri(), self.kind, self.span.start, self.span.end)
    }
}

/// The walker's full output: de-duplicated references plus every
/// diagnostic raised along the way.
#[derive(Debug, Clone, Default)]
pub struct WalkResult {
    pub references: Vec<ResourceRef>,
    pub diagnostics: Vec<Diagnostic>,
}

/// The domain's resource-name aliases (see the glossary entry
/// "Resource-name alias"): type names the walker treats as carrying a
/// resource identity rather than an ordinary string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AliasKind {
    Backdrop,
    Sprite,
    SpriteCostume,
    SpriteAnimation,
    Sound,
    Widget,
}

impl AliasKind {
    fn label(self) -> &'static str {
        match self {
            AliasKind::Backdrop => "backdrop",
            AliasKind::Sprite => "sprite",
            AliasKind::SpriteCostume => "sprite costume",
            AliasKind::SpriteAnimation => "sprite animation",
            AliasKind::Sound => "sound",
            AliasKind::Widget => "widget",
        }
    }
}

fn alias_kind_for_type(ty: &TypeRef) -> Option<AliasKind> {
    match ty.name.as_str() {
        "BackdropName" => Some(AliasKind::Backdrop),
        "SpriteName" => Some(AliasKind::Sprite),
        "SpriteCostumeName" => Some(AliasKind::SpriteCostume),
        "SpriteAnimationName" => Some(AliasKind::SpriteAnimation),
        "SoundName" => Some(AliasKind::Sound),
        "WidgetName" => Some(AliasKind::Widget),
        _ => None,
    }
}

/// Accumulates references and diagnostics across the whole walk.
#[derive(Default)]
struct Output {
    references: Vec<ResourceRef>,
    seen: std::collections::HashSet<(String, ReferenceKind, u32, u32)>,
    diagnostics: Vec<Diagnostic>,
}

impl Output {
    fn push_ref(&mut self, id: ResourceId, kind: ReferenceKind, span: Span) {
        let r = ResourceRef { id, kind, span };
        if self.seen.insert(r.dedup_key()) {
            self.references.push(r);
        }
    }

    fn push_diag(&mut self, ctx: &WalkerCtx<'_>, message: String, path: &str, span: Span) {
        let translated = (ctx.translate)(&message);
        self.diagnostics.push(
            Diagnostic::new(translated)
                .with_path(path.to_string())
                .with_span(span),
        );
    }
}

/// Read-only lookups shared by every dispatch call in a single walk.
struct WalkerCtx<'a> {
    resources: Option<&'a ResourceSet>,
    sprite_struct_names: &'a HashMap<String, String>,
    auto_bindings: &'a HashMap<String, String>,
    top_level_consts: &'a HashMap<String, String>,
    translate: &'a dyn Fn(&str) -> String,
}

/// Run the reference walker over `project`.
///
/// `resources` is the project's parsed asset tree (`None` when the
/// resource index itself failed to build — the walker still runs and
/// still emits references, it just can't confirm any of them resolve).
/// `translate` is applied to every diagnostic message before it is
/// stored: diagnostics are translated through the provided function
/// before storage.
pub fn walk(
    project: &Project,
    resources: Option<&ResourceSet>,
    translate: impl Fn(&str) -> String,
) -> Result<WalkResult> {
    let ast_package = project.get_ast_package()?;
    let type_info = project.get_type_info()?;

    let mut file_paths: Vec<&String> = ast_package.files.keys().collect();
    file_paths.sort();

    // Phase 1 — sprite type collection.
    let mut sprite_struct_names: HashMap<String, String> = HashMap::new();
    for path in &file_paths {
        let Some(sprite_name) = spx_sprite_candidate(path) else {
            continue;
        };
        if let Some(Decl::Struct(s)) = type_info.package.scope.lookup(sprite_name) {
            sprite_struct_names.insert(s.name.clone(), sprite_name.to_string());
        }
    }

    // Phase 2 — auto-binding inspection (defining sites).
    let mut auto_bindings: HashMap<String, String> = HashMap::new();
    let mut out = Output::default();
    if let Some(Decl::Struct(game)) = type_info.package.scope.lookup("Game") {
        for field in &game.fields {
            let stripped = field.ty.pointer_stripped();
            let sprite_name = if stripped.name == "Sprite" {
                Some(field.name.clone())
            } else {
                sprite_struct_names.get(&stripped.name).cloned()
            };
            if let Some(sprite_name) = sprite_name {
                auto_bindings.insert(field.name.clone(), sprite_name.clone());
                out.push_ref(
                    ResourceId::Sprite { name: sprite_name },
                    ReferenceKind::AutoBinding,
                    field.name_span,
                );
            }
        }
    }

    // Phase 2 (continued) — use-site scan for auto-binding references.
    for path in &file_paths {
        let ast = &ast_package.files[*path];
        for decl in &ast.decls {
            match decl {
                Decl::Func(f) => scan_idents_in_body(&f.body, &auto_bindings, &mut out),
                Decl::ConstOrVar(cv) => {
                    if let Some(v) = &cv.value {
                        scan_idents_in_expr(v, &auto_bindings, &mut out);
                    }
                }
                Decl::Struct(_) => {}
            }
        }
    }

    let top_level_consts = collect_top_level_consts(&ast_package);
    let translate_ref: &dyn Fn(&str) -> String = &translate;
    let ctx = WalkerCtx {
        resources,
        sprite_struct_names: &sprite_struct_names,
        auto_bindings: &auto_bindings,
        top_level_consts: &top_level_consts,
        translate: translate_ref,
    };

    let mut func_decls: HashMap<&str, &FuncDecl> = HashMap::new();
    for ast in ast_package.files.values() {
        for decl in &ast.decls {
            if let Decl::Func(f) = decl {
                func_decls.insert(f.name.as_str(), f);
            }
        }
    }

    // Phase 3 — definition inspection, then phase 4 — expression
    // inspection, file by file in a stable order (so diagnostics come
    // out in a deterministic sequence).
    for path in &file_paths {
        let ast = &ast_package.files[*path];
        for decl in &ast.decls {
            match decl {
                Decl::ConstOrVar(cv) => {
                    if let Some(value) = &cv.value {
                        let ty = cv
                            .declared_type
                            .as_ref()
                            .map(|t| t.pointer_stripped())
                            .or_else(|| value.static_type.clone());
                        if let Some(alias) = ty.as_ref().and_then(alias_kind_for_type) {
                            dispatch_leaf(
                                &ctx,
                                &mut out,
                                alias,
                                value,
                                path,
                                file_sprite_context(path).as_deref(),
                            );
                        }
                    }
                }
                Decl::Func(f) => walk_func_body(&ctx, &mut out, path, f, &func_decls),
                Decl::Struct(_) => {}
            }
        }
    }

    Ok(WalkResult {
        references: out.references,
        diagnostics: out.diagnostics,
    })
}

/// `P.spx`'s candidate sprite name, or `None` for `main.spx` and
/// non-`.spx` files.
fn spx_sprite_candidate(path: &str) -> Option<&str> {
    let base = base_name(path);
    if base == "main.spx" {
        return None;
    }
    base.strip_suffix(".spx")
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// The default sprite context for an expression in `path`: the file's
/// base name minus `.spx`, unless the file is `main.spx` or isn't a
/// classfile at all: the file's base name is interpreted as a sprite
/// lookup, unless the file is `main.spx`.
fn file_sprite_context(path: &str) -> Option<String> {
    spx_sprite_candidate(path).map(str::to_string)
}

fn walk_func_body(
    ctx: &WalkerCtx<'_>,
    out: &mut Output,
    path: &str,
    func: &FuncDecl,
    func_decls: &HashMap<&str, &FuncDecl>,
) {
    let mut last_assign: HashMap<String, Expr> = HashMap::new();
    for stmt in &func.body {
        match stmt {
            Stmt::Assign { lhs, rhs } => {
                if let ExprKind::Ident(id) = &lhs.kind {
                    last_assign.insert(id.name.clone(), rhs.clone());
                }
            }
            Stmt::Expr(e) => {
                dispatch_top_level_expr(ctx, out, path, e, &last_assign, func_decls)
            }
            Stmt::Return(exprs) => {
                for (index, e) in exprs.iter().enumerate() {
                    if let ExprKind::StringLit(s) = &e.kind {
                        let ty = func
                            .results
                            .get(index)
                            .cloned()
                            .or_else(|| e.static_type.clone());
                        if let Some(alias) = ty.as_ref().and_then(alias_kind_for_type) {
                            dispatch_value(
                                ctx,
                                out,
                                alias,
                                s.clone(),
                                ReferenceKind::StringLiteral,
                                e.span,
                                path,
                                file_sprite_context(path).as_deref(),
                            );
                            continue;
                        }
                    }
                    dispatch_top_level_expr(ctx, out, path, e, &last_assign, func_decls);
                }
            }
            Stmt::Other => {}
        }
    }
}

fn dispatch_top_level_expr(
    ctx: &WalkerCtx<'_>,
    out: &mut Output,
    path: &str,
    e: &Expr,
    last_assign: &HashMap<String, Expr>,
    func_decls: &HashMap<&str, &FuncDecl>,
) {
    match &e.kind {
        ExprKind::StringLit(s) => {
            if let Some(alias) = e.static_type.as_ref().and_then(alias_kind_for_type) {
                dispatch_value(
                    ctx,
                    out,
                    alias,
                    s.clone(),
                    ReferenceKind::StringLiteral,
                    e.span,
                    path,
                    file_sprite_context(path).as_deref(),
                );
            }
        }
        ExprKind::Ident(id) => {
            if let Some(alias) = e.static_type.as_ref().and_then(alias_kind_for_type) {
                if let Some(rhs) = last_assign.get(&id.name) {
                    dispatch_leaf(ctx, out, alias, rhs, path, file_sprite_context(path).as_deref());
                } else if let Some(value) = ctx.top_level_consts.get(&id.name) {
                    dispatch_value(
                        ctx,
                        out,
                        alias,
                        value.clone(),
                        ReferenceKind::ConstantReference,
                        e.span,
                        path,
                        file_sprite_context(path).as_deref(),
                    );
                }
            }
        }
        ExprKind::Call {
            callee,
            args,
            receiver,
        } => dispatch_call(ctx, out, path, func_decls, callee, args, receiver),
        ExprKind::SliceLit(_) | ExprKind::Other => {}
    }
}

/// Dispatch a single leaf expression (a call argument, a resolved
/// assignment RHS, or a slice-literal element) that is already known
/// to occupy a resource-name-aliased type slot.
fn dispatch_leaf(
    ctx: &WalkerCtx<'_>,
    out: &mut Output,
    alias: AliasKind,
    expr: &Expr,
    path: &str,
    sprite_ctx: Option<&str>,
) {
    match &expr.kind {
        ExprKind::StringLit(s) => dispatch_value(
            ctx,
            out,
            alias,
            s.clone(),
            ReferenceKind::StringLiteral,
            expr.span,
            path,
            sprite_ctx,
        ),
        ExprKind::Ident(id) => {
            if let Some(value) = ctx.top_level_consts.get(&id.name) {
                dispatch_value(
                    ctx,
                    out,
                    alias,
                    value.clone(),
                    ReferenceKind::ConstantReference,
                    expr.span,
                    path,
                    sprite_ctx,
                );
            }
        }
        _ => {}
    }
}

/// Common tail for every dispatch path: validate the name, build the
/// resource id, emit the reference, and check the resource actually
/// exists.
#[allow(clippy::too_many_arguments)]
fn dispatch_value(
    ctx: &WalkerCtx<'_>,
    out: &mut Output,
    alias: AliasKind,
    name: String,
    kind: ReferenceKind,
    span: Span,
    path: &str,
    sprite_ctx: Option<&str>,
) {
    if name.is_empty() {
        out.push_diag(
            ctx,
            format!("{} resource name cannot be empty", alias.label()),
            path,
            span,
        );
        return;
    }

    let id = match alias {
        AliasKind::Backdrop => ResourceId::Backdrop { name },
        AliasKind::Sprite => ResourceId::Sprite { name },
        AliasKind::Sound => ResourceId::Sound { name },
        AliasKind::Widget => ResourceId::Widget { name },
        AliasKind::SpriteCostume => match sprite_ctx {
            Some(sprite) => ResourceId::SpriteCostume {
                sprite: sprite.to_string(),
                costume: name,
            },
            None => return,
        },
        AliasKind::SpriteAnimation => match sprite_ctx {
            Some(sprite) => ResourceId::SpriteAnimation {
                sprite: sprite.to_string(),
                animation: name,
            },
            None => return,
        },
    };

    out.push_ref(id.clone(), kind, span);

    if let Some(resources) = ctx.resources {
        if !resources.resolve(&id) {
            out.push_diag(ctx, not_found_message(alias, &id), path, span);
        }
    }
}

fn not_found_message(alias: AliasKind, id: &ResourceId) -> String {
    match id {
        ResourceId::SpriteCostume { sprite, costume } => format!(
            "sprite costume resource \"{costume}\" not found in sprite \"{sprite}\""
        ),
        ResourceId::SpriteAnimation { sprite, animation } => format!(
            "sprite animation resource \"{animation}\" not found in sprite \"{sprite}\""
        ),
        ResourceId::Backdrop { name }
        | ResourceId::Sprite { name }
        | ResourceId::Sound { name }
        | ResourceId::Widget { name } => {
            format!("{} resource \"{name}\" not found", alias.label())
        }
    }
}

/// Resolve a call expression's sprite-scoped, resource-typed
/// arguments, pairing each with the callee's declared parameter type.
fn dispatch_call(
    ctx: &WalkerCtx<'_>,
    out: &mut Output,
    path: &str,
    func_decls: &HashMap<&str, &FuncDecl>,
    callee: &Expr,
    args: &[Expr],
    receiver: &Option<Box<Expr>>,
) {
    let ExprKind::Ident(callee_id) = &callee.kind else {
        return;
    };
    let is_method = receiver.is_some();
    let Some(fd) = func_decls
        .get(callee_id.name.as_str())
        .copied()
        .filter(|fd| fd.receiver.is_some() == is_method)
    else {
        return;
    };

    let has_resource_param = fd
        .params
        .iter()
        .any(|p| alias_kind_for_type(&p.ty.slice_stripped().pointer_stripped()).is_some());
    if !has_resource_param {
        return;
    }

    // Computed once per call node: this is the "once-only" lazy sprite
    // context the design notes call for, degenerated to a plain value
    // since resolving it is pure and cheap here.
    let sprite_ctx = call_sprite_context(ctx, path, fd, receiver);

    for (arg, param) in args.iter().zip(fd.params.iter()) {
        let ty = param.ty.slice_stripped().pointer_stripped();
        let Some(alias) = alias_kind_for_type(&ty) else {
            continue;
        };
        match &arg.kind {
            ExprKind::SliceLit(elements) => {
                for el in elements {
                    dispatch_leaf(ctx, out, alias, el, path, sprite_ctx.as_deref());
                }
            }
            _ => dispatch_leaf(ctx, out, alias, arg, path, sprite_ctx.as_deref()),
        }
    }
}

fn call_sprite_context(
    ctx: &WalkerCtx<'_>,
    path: &str,
    fd: &FuncDecl,
    receiver: &Option<Box<Expr>>,
) -> Option<String> {
    let recv_ty = fd.receiver.as_ref()?.pointer_stripped();
    if recv_ty.name != "Sprite" && !ctx.sprite_struct_names.contains_key(&recv_ty.name) {
        return None;
    }
    match receiver {
        None => file_sprite_context(path),
        Some(recv_expr) => match &recv_expr.kind {
            ExprKind::Ident(id) => ctx.auto_bindings.get(&id.name).cloned(),
            _ => None,
        },
    }
}

fn scan_idents_in_body(body: &[Stmt], auto_bindings: &HashMap<String, String>, out: &mut Output) {
    for stmt in body {
        match stmt {
            Stmt::Expr(e) => scan_idents_in_expr(e, auto_bindings, out),
            Stmt::Assign { lhs, rhs } => {
                scan_idents_in_expr(lhs, auto_bindings, out);
                scan_idents_in_expr(rhs, auto_bindings, out);
            }
            Stmt::Return(exprs) => {
                for e in exprs {
                    scan_idents_in_expr(e, auto_bindings, out);
                }
            }
            Stmt::Other => {}
        }
    }
}

fn scan_idents_in_expr(expr: &Expr, auto_bindings: &HashMap<String, String>, out: &mut Output) {
    match &expr.kind {
        ExprKind::Ident(id) => {
            if let Some(sprite_name) = auto_bindings.get(&id.name) {
                out.push_ref(
                    ResourceId::Sprite {
                        name: sprite_name.clone(),
                    },
                    ReferenceKind::AutoBindingReference,
                    id.span,
                );
            }
        }
        ExprKind::Call {
            callee,
            args,
            receiver,
        } => {
            scan_idents_in_expr(callee, auto_bindings, out);
            for a in args {
                scan_idents_in_expr(a, auto_bindings, out);
            }
            if let Some(r) = receiver {
                scan_idents_in_expr(r, auto_bindings, out);
            }
        }
        ExprKind::SliceLit(elements) => {
            for e in elements {
                scan_idents_in_expr(e, auto_bindings, out);
            }
        }
        ExprKind::StringLit(_) | ExprKind::Other => {}
    }
}

fn collect_top_level_consts(ast_package: &AstPackageResult) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for ast in ast_package.files.values() {
        for decl in &ast.decls {
            if let Decl::ConstOrVar(cv) = decl {
                if let Some(Expr {
                    kind: ExprKind::StringLit(s),
                    ..
                }) = &cv.value
                {
                    out.insert(cv.name.name.clone(), s.clone());
                }
            }
        }
    }
    out
}
