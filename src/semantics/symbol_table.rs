//! src/semantics/symbol_table.rs

use crate::common::Type;
use std::collections::{HashMap, HashSet};

/// 符号表中存储的关于一个变量的信息
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub declared_type: Type,
    /// 变量在 TAC 中使用的唯一名字
    pub slot: String,
    pub initialized: bool,
}

/// 按块嵌套的作用域栈。最外层是整个程序的作用域，永远不会被弹出。
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<HashMap<String, Symbol>>,
    // 每个名字已经被声明过多少次，用于生成 slot
    declarations: HashMap<String, usize>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![HashMap::new()],
            declarations: HashMap::new(),
        }
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn exit_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// 在当前作用域中声明一个变量，返回它的 slot。
    /// 如果同一作用域里已经有这个名字，返回 `None`。
    pub fn declare(&mut self, name: &str, declared_type: Type, initialized: bool) -> Option<String> {
        if self.scopes.last().is_some_and(|scope| scope.contains_key(name)) {
            return None;
        }

        let count = self.declarations.entry(name.to_string()).or_insert(0);
        let slot = if *count == 0 && !looks_like_temporary(name) {
            name.to_string()
        } else {
            format!("{}.{}", name, count)
        };
        *count += 1;

        let scope = self.scopes.last_mut()?;
        scope.insert(
            name.to_string(),
            Symbol {
                declared_type,
                slot: slot.clone(),
                initialized,
            },
        );
        Some(slot)
    }

    /// 从内到外查找一个名字。
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// 标记最近可见的那个绑定已被赋值。
    pub fn mark_initialized(&mut self, name: &str) -> bool {
        match self
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
        {
            Some(symbol) => {
                symbol.initialized = true;
                true
            }
            None => false,
        }
    }

    /// 当前所有已赋值变量的 slot 快照。
    pub fn initialized_slots(&self) -> HashSet<String> {
        self.scopes
            .iter()
            .flat_map(|scope| scope.values())
            .filter(|symbol| symbol.initialized)
            .map(|symbol| symbol.slot.clone())
            .collect()
    }

    /// 所有可见变量的 slot。
    pub fn visible_slots(&self) -> HashSet<String> {
        self.scopes
            .iter()
            .flat_map(|scope| scope.values())
            .map(|symbol| symbol.slot.clone())
            .collect()
    }

    /// 把所有可见变量标记为已赋值。
    pub fn mark_all_initialized(&mut self) {
        for symbol in self.scopes.iter_mut().flat_map(|scope| scope.values_mut()) {
            symbol.initialized = true;
        }
    }

    /// 用快照覆盖所有可见变量的赋值状态。
    pub fn restore_initialized(&mut self, slots: &HashSet<String>) {
        for symbol in self.scopes.iter_mut().flat_map(|scope| scope.values_mut()) {
            symbol.initialized = slots.contains(&symbol.slot);
        }
    }
}

/// 形如 `t0`、`t17` 的名字会和编译器生成的临时变量冲突。
fn looks_like_temporary(name: &str) -> bool {
    name.strip_prefix('t')
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}
