//! # 广义 Place/Transition 网执行核心
//!
//! 设库所集合 `P` 与迁移集合 `T`，输入/输出矩阵 `Pre, Post ∈ ℕ^{|P|×|T|}`，
//! 效应矩阵 `C = Post − Pre`。对标识 `M ∈ ℕ^{|P|}`，迁移 `t` **可激发**
//! 当且仅当同时满足：
//!
//! 1. `∀p: M[p] ≥ Pre[p, t]`；
//! 2. 若 `t` 声明守卫 `g` 与期望值 `v`，则守卫表中 `g` 存在且取值为 `v`；
//! 3. 对每条抑制弧 `(p, t)`：`M[p] = 0`；
//! 4. 对每条复位弧 `(p, t)`：`M[p] > 0`；
//! 5. 对每条读弧 `(p, t)`：`M[p] ≥ Reader[p, t]`。
//!
//! **发射** 为原子步骤：对复位弧来源强制 `M'[p] = 0`（覆盖 `C` 的贡献），
//! 其余库所 `M'[p] = M[p] + C[p, t]`；随后整表重算使能缓存。发射与守卫
//! 更新共用一把网级互斥锁，多线程可安全竞争发射。
//!
//! ## 示例
//!
//! ```rust
//! use pnmon::net::*;
//!
//! let places = vec![Place::new("p0", 0, 1), Place::new("p1", 1, 0)];
//! let transitions = vec![Transition::new("t0", 0)];
//! let pre: Incidence<Weight> = Incidence::from_nested(vec![vec![1], vec![0]]).unwrap();
//! let post: Incidence<Weight> = Incidence::from_nested(vec![vec![0], vec![1]]).unwrap();
//! let inc = post.difference(&pre);
//!
//! let net = PetriNet::from_components(NetComponents {
//!     places,
//!     transitions,
//!     arcs: Vec::new(),
//!     initial_marking: vec![1, 0],
//!     pre,
//!     post,
//!     inc,
//!     inhibition: None,
//!     reset: None,
//!     reader: None,
//! })
//! .unwrap();
//! net.initialize();
//!
//! assert_eq!(net.fire(TransitionId::new(0)).unwrap(), FireOutcome::Success);
//! assert_eq!(net.current_marking().tokens(PlaceId::new(1)), 1);
//! ```

pub mod core;
pub mod ids;
pub mod incidence;
pub mod index_vec;
pub mod structure;

pub use self::core::{
    EnabledStrategy, FireOutcome, GuardMap, GuardSeed, GuardWrite, PetriNet, PetriNetError,
    PlaceTransitionStrategy,
};
pub use ids::{PlaceId, TransitionId};
pub use incidence::{Incidence, IncidenceBool, ShapeError};
pub use index_vec::{Idx, IndexVec};
pub use structure::{
    Arc, ArcDirection, ArcKind, Guard, Label, Marking, NetComponents, Place, Transition, Weight,
};
