//! src/common.rs
use std::fmt;

/// 一个简单的计数器，用于在整个编译流程中生成唯一的标识符。
#[derive(Debug, Default)]
pub struct UniqueIdGenerator {
    counter: usize,
}

impl UniqueIdGenerator {
    pub fn new() -> Self {
        UniqueIdGenerator { counter: 0 }
    }

    /// 获取下一个唯一的数字标识符。
    pub fn next(&mut self) -> usize {
        let id = self.counter;
        self.counter += 1;
        id
    }
}

/// 源码中的位置，行号和列号都从 1 开始。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Position { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// 语言中的标量类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Float,
    Bool,
}

impl Type {
    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }

    /// `value` 类型的值能否存进 `self` 类型的变量。只允许 int -> float 的隐式拓宽。
    pub fn accepts(self, value: Type) -> bool {
        self == value || (self == Type::Float && value == Type::Int)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Int => "int",
            Type::Float => "float",
            Type::Bool => "bool",
        };
        f.write_str(name)
    }
}
