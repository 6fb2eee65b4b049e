//! Lexical scope tracking over an IR tree.
//!
//! [`Environment::build`] walks the tree once and records every class,
//! function, argument and local it declares. Later passes go through
//! [`walk_scoped`], which re-enters those records by node identity so the
//! same site always gets the same global path.
use std::fmt;

use crate::ir::{attrs, IrNode, NodeId, Walk};
use crate::model::MixedModel;

/// A declaration site and the blackboard key it is known by.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathNode {
    pub path: String,
    pub node: NodeId,
}

impl fmt::Display for PathNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.path) }
}

#[derive(Clone, Debug)]
pub struct FunctionEnv {
    pub name: String,
    pub node: NodeId,
    pub class: Option<usize>,
    pub arguments: Vec<(String, PathNode)>,
    pub variables: Vec<(String, PathNode)>,
}

#[derive(Clone, Debug)]
pub struct ClassEnv {
    pub name: String,
    pub node: NodeId,
    pub properties: Vec<String>,
    pub functions: Vec<usize>,
}

/// Where a node sits: its enclosing class and function, if any. Outside
/// both is file scope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Scope {
    pub class: Option<usize>,
    pub function: Option<usize>,
}

/// Dot-joined qualified path: `class.function.local`.
#[derive(Clone, Debug, Default)]
pub struct GlobalNodePath {
    nodes: Vec<String>,
}

impl GlobalNodePath {
    pub fn append_scope(&mut self, scope: Scope, env: &Environment) {
        if let Some(class) = scope.class {
            self.nodes.push(env.classes[class].name.clone());
        }
        if let Some(function) = scope.function {
            self.nodes.push(env.functions[function].name.clone());
        }
    }

    pub fn append_path(&mut self, path: impl Into<String>) {
        self.nodes.push(path.into());
    }
}

impl fmt::Display for GlobalNodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.nodes.join("."))
    }
}

#[derive(Clone, Debug, Default)]
pub struct Environment {
    pub classes: Vec<ClassEnv>,
    pub functions: Vec<FunctionEnv>,
    /// File-scope locals.
    pub globals: Vec<(String, PathNode)>,
}

impl Environment {
    /// Record every declaration under `root`.
    pub fn build(root: &IrNode) -> Self {
        let mut env = Environment::default();
        env.declare(root, Scope::default());
        tracing::debug!(
            classes = env.classes.len(),
            functions = env.functions.len(),
            globals = env.globals.len(),
            "scope built"
        );
        env
    }

    fn declare(&mut self, node: &IrNode, scope: Scope) {
        let mut inner = scope;
        if node.get_bool(&attrs::CLASS_DECLARATION) {
            self.classes.push(ClassEnv {
                name: node.get_str(&attrs::NAME).unwrap_or_default().to_string(),
                node: node.id(),
                properties: Vec::new(),
                functions: Vec::new(),
            });
            inner = Scope { class: Some(self.classes.len() - 1), function: None };
        } else if node.get_bool(&attrs::FUNCTION_DECL) {
            let index = self.functions.len();
            self.functions.push(FunctionEnv {
                name: node.get_str(&attrs::NAME).unwrap_or_default().to_string(),
                node: node.id(),
                class: scope.class,
                arguments: Vec::new(),
                variables: Vec::new(),
            });
            if let Some(class) = scope.class {
                self.classes[class].functions.push(index);
            }
            inner = Scope { class: scope.class, function: Some(index) };
            for arg in node.get_nodes(&attrs::ARGUMENTS) {
                let Some(name) = arg.get_str(&attrs::ARGUMENT_NAME) else { continue };
                let declared = self.path_node(arg, inner);
                self.functions[index].arguments.push((name.to_string(), declared));
            }
        } else if node.get_bool(&attrs::VARIABLE_DECLARATION) {
            let id = node.get_str(&attrs::VARIABLE_DECLARATION_ID).unwrap_or_default().to_string();
            let declared = self.path_node(node, scope);
            match scope.function {
                Some(function) => self.functions[function].variables.push((id, declared)),
                None => self.globals.push((id, declared)),
            }
        } else if let Some(class) = scope.class {
            // `this.x = …` anywhere in a class names a property
            if let Some(name) = assigned_property(node) {
                if !self.classes[class].properties.contains(&name) {
                    self.classes[class].properties.push(name);
                }
            }
        }
        for child in node.child_nodes() {
            self.declare(child, inner);
        }
    }

    /// Scope inside `node`, given the scope around it.
    pub fn enter(&self, node: &IrNode, scope: Scope) -> Scope {
        if node.get_bool(&attrs::CLASS_DECLARATION) {
            let class = self.classes.iter().position(|c| c.node == node.id());
            return Scope { class: class.or(scope.class), function: None };
        }
        if node.get_bool(&attrs::FUNCTION_DECL) {
            let function = self.functions.iter().position(|f| f.node == node.id());
            return Scope { class: scope.class, function: function.or(scope.function) };
        }
        scope
    }

    /// `this`/`self` mean the enclosing class.
    pub fn find_class(&self, scope: Scope, name: &str) -> Option<&ClassEnv> {
        if name == "this" || name == "self" {
            return scope.class.map(|c| &self.classes[c]);
        }
        self.classes.iter().find(|c| c.name == name)
    }

    /// Resolve an identifier to its declaration: locals of the enclosing
    /// function, then its arguments, then file scope.
    pub fn find_declaration(&self, node: &IrNode, scope: Scope) -> Option<&PathNode> {
        let ident = node.get_str(&attrs::IDENTIFIER)?;
        if let Some(function) = scope.function.map(|f| &self.functions[f]) {
            let found = lookup(&function.variables, ident)
                .or_else(|| lookup(&function.arguments, ident));
            if found.is_some() {
                return found;
            }
        }
        lookup(&self.globals, ident)
    }

    pub fn find_global_path(&self, node: &IrNode, scope: Scope) -> GlobalNodePath {
        if node.get_bool(&attrs::THIS_EXPRESSION) {
            if let Some(class) = scope.class {
                let mut path = GlobalNodePath::default();
                path.append_path(self.classes[class].name.clone());
                return path;
            }
        }
        let mut path = GlobalNodePath::default();
        path.append_scope(scope, self);
        if let Some(ident) = node.get_str(&attrs::IDENTIFIER) {
            path.append_path(ident);
        } else if let Some(id) = node.get_str(&attrs::VARIABLE_DECLARATION_ID) {
            path.append_path(id);
        } else if let Some(name) = node.get_str(&attrs::ARGUMENT_NAME) {
            path.append_path(name);
        } else {
            path.append_path(format!("{}@{}", node.kind(), node.id()));
        }
        path
    }

    /// Blackboard key for `node`. Identifiers resolve to their declaration;
    /// undeclared ones get a path of their own and simply stay unresolved.
    pub fn path_node(&self, node: &IrNode, scope: Scope) -> PathNode {
        if node.exist_field(&attrs::IDENTIFIER) {
            if let Some(decl) = self.find_declaration(node, scope) {
                return decl.clone();
            }
            tracing::debug!(identifier = ?node.get_str(&attrs::IDENTIFIER), "no declaration in scope");
        }
        PathNode { path: self.find_global_path(node, scope).to_string(), node: node.id() }
    }
}

fn lookup<'e>(decls: &'e [(String, PathNode)], ident: &str) -> Option<&'e PathNode> {
    decls.iter().find(|(name, _)| name == ident).map(|(_, p)| p)
}

fn assigned_property(node: &IrNode) -> Option<String> {
    let left = node.get_node(&attrs::ASSIGN_EXPRESSION_LEFT)?;
    let object = left.get_node(&attrs::MEMBER_EXPRESSION_OBJECT)?;
    if !object.get_bool(&attrs::THIS_EXPRESSION) {
        return None;
    }
    let property = left.get_node(&attrs::MEMBER_EXPRESSION_PROPERTY)?;
    property.get_str(&attrs::IDENTIFIER).map(str::to_string)
}

/// Pre-order walk that hands every node the scope it is visited in. A class
/// or function declaration is visited in its own scope; the scope around it
/// is restored once its subtree is done.
pub fn walk_scoped<'a, E>(
    node: &'a IrNode,
    scope: Scope,
    env: &Environment,
    visit: &mut impl FnMut(&'a IrNode, Scope) -> Result<Walk, E>,
) -> Result<(), E> {
    let inner = env.enter(node, scope);
    if visit(node, inner)? == Walk::Skip {
        return Ok(());
    }
    for child in node.child_nodes() {
        walk_scoped(child, inner, env, visit)?;
    }
    Ok(())
}
