pub mod post;
pub mod session;
pub mod user;

pub mod prelude {
    pub use crate::post::{
        Category, CategoryFilter, NewPost, Post as PostEntity, PostId,
        ALL_LABEL,
    };
    pub use crate::session::{AuthEvent, AuthEventKind, Session};
    pub use crate::user::User as UserEntity;
}
