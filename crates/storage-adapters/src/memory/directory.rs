use async_trait::async_trait;
use dashmap::DashMap;
use domains::{PostDirectory, PostId, PostSummary, Role, User, UserDirectory, UserId};

/// Stand-in for the Identity Provider and the Content Repository. Records
/// are seeded by the host; the core only ever reads them.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: DashMap<UserId, User>,
    posts: DashMap<PostId, PostSummary>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user: User) -> UserId {
        let id = user.id;
        self.users.insert(id, user);
        id
    }

    pub fn remove_user(&self, id: UserId) -> Option<User> {
        self.users.remove(&id).map(|(_, u)| u)
    }

    pub fn add_post(&self, post: PostSummary) -> PostId {
        let id = post.id;
        self.posts.insert(id, post);
        id
    }

    pub fn remove_post(&self, id: PostId) -> Option<PostSummary> {
        self.posts.remove(&id).map(|(_, p)| p)
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn find_user(&self, id: UserId) -> anyhow::Result<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn users_with_role(&self, role: Role, limit: usize) -> anyhow::Result<Vec<User>> {
        let mut holders: Vec<User> = self
            .users
            .iter()
            .filter(|u| u.has_role(role))
            .map(|u| u.value().clone())
            .collect();
        holders.sort_by_key(|u| u.id);
        holders.truncate(limit);
        Ok(holders)
    }

    async fn count_users(&self) -> anyhow::Result<u64> {
        Ok(self.users.len() as u64)
    }
}

#[async_trait]
impl PostDirectory for InMemoryDirectory {
    async fn find_post(&self, id: PostId) -> anyhow::Result<Option<PostSummary>> {
        Ok(self.posts.get(&id).map(|p| p.value().clone()))
    }

    async fn count_posts(&self) -> anyhow::Result<u64> {
        Ok(self.posts.len() as u64)
    }
}
