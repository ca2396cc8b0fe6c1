pub mod category;
pub mod post;
pub mod topic;
pub mod topic_tag;
pub mod user;

pub use category::{Entity as Category, Model as CategoryModel};
pub use post::{Entity as Post, Model as PostModel};
pub use topic::{Entity as Topic, Model as TopicModel};
pub use topic_tag::Entity as TopicTag;
pub use user::{Entity as User, Model as UserModel};
