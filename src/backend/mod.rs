pub mod asm_gen;
pub mod emitter;
pub mod machine;
pub mod optimizer;
pub mod tacky_gen;
