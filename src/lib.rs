//! Petri 网执行引擎：面向并发监视器的底层基质。
//!
//! 模型、使能判定与原子发射见 [`net`] 模块；上层的线程调度监视器、
//! PNML 解析与网工厂均为本 crate 的外部协作者。

pub mod net;

pub use net::{FireOutcome, GuardWrite, PetriNet, PetriNetError};
