//! REST demo for Melon
//!
//! A small user directory served as a resource at `/users/:name`:
//! - GET returns the user, as JSON or XML depending on `Accept`
//! - POST creates or replaces the user from a JSON or XML body
//! - DELETE removes the user
//!
//! The admin surface gets a health check over the directory and a task that
//! empties it.
//!
//! Run with: cargo run -p rest-demo
//! Then try:
//!   curl -X POST -H 'content-type: application/json' \
//!        -d '{"email":"ada@example.com"}' http://127.0.0.1:8080/users/ada
//!   curl -H 'accept: application/xml' http://127.0.0.1:8080/users/ada
//!   curl http://127.0.0.1:8081/healthcheck
//!   curl -X POST http://127.0.0.1:8081/tasks/clear-users

use melon::prelude::*;
use std::collections::BTreeMap;
use std::sync::RwLock;

// ============================================
// Data Models
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct User {
    name: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct NewUser {
    email: String,
}

#[derive(Debug, Serialize)]
struct Removed {
    removed: String,
}

// ============================================
// Storage
// ============================================

#[derive(Default)]
struct Directory {
    users: RwLock<BTreeMap<String, User>>,
}

impl Directory {
    fn get(&self, name: &str) -> Option<User> {
        self.users.read().ok()?.get(name).cloned()
    }

    fn put(&self, user: User) -> Result<()> {
        let mut users = self
            .users
            .write()
            .map_err(|_| ApiError::internal("User directory is unavailable"))?;
        users.insert(user.name.clone(), user);
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<Option<User>> {
        let mut users = self
            .users
            .write()
            .map_err(|_| ApiError::internal("User directory is unavailable"))?;
        Ok(users.remove(name))
    }

    fn clear(&self) -> usize {
        match self.users.write() {
            Ok(mut users) => {
                let count = users.len();
                users.clear();
                count
            }
            Err(_) => 0,
        }
    }

    fn is_available(&self) -> bool {
        self.users.read().is_ok()
    }
}

// ============================================
// Resource
// ============================================

struct UserResource {
    directory: Arc<Directory>,
}

fn name_of(ctx: &RequestContext) -> String {
    ctx.param("name").unwrap_or_default().to_string()
}

#[async_trait]
impl Get for UserResource {
    async fn get(&self, ctx: RequestContext) -> std::result::Result<Entity, BoxError> {
        let name = name_of(&ctx);
        match self.directory.get(&name) {
            Some(user) => Ok(Entity::new(user)),
            None => Err(ApiError::not_found(format!("No user named {name}")).into()),
        }
    }
}

#[async_trait]
impl Post for UserResource {
    type Body = NewUser;

    async fn post(&self, ctx: RequestContext, body: NewUser) -> std::result::Result<Entity, BoxError> {
        if !body.email.contains('@') {
            return Err(ApiError::bad_request("email must contain '@'").into());
        }
        let user = User {
            name: name_of(&ctx),
            email: body.email,
        };
        self.directory.put(user.clone())?;
        info!(user = %user.name, "User stored");
        Ok(Entity::new(user))
    }
}

#[async_trait]
impl Delete for UserResource {
    async fn delete(&self, ctx: RequestContext) -> std::result::Result<Entity, BoxError> {
        let name = name_of(&ctx);
        match self.directory.remove(&name)? {
            Some(_) => Ok(Entity::new(Removed { removed: name })),
            None => Err(ApiError::not_found(format!("No user named {name}")).into()),
        }
    }
}

impl Resource for UserResource {
    fn path(&self) -> &str {
        "/users/:name"
    }

    fn as_get(self: Arc<Self>) -> Option<VerbHandler> {
        Some(VerbHandler::get(self))
    }

    fn as_post(self: Arc<Self>) -> Option<VerbHandler> {
        Some(VerbHandler::post(self))
    }

    fn as_delete(self: Arc<Self>) -> Option<VerbHandler> {
        Some(VerbHandler::delete(self))
    }
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() -> std::result::Result<(), BoxError> {
    let directory = Arc::new(Directory::default());

    let health = directory.clone();
    let tasks = directory.clone();

    Melon::from_env()?
        .resource(UserResource { directory })
        .route("GET", "/", || async { "Melon REST demo\n" })
        .health_check("directory", move || {
            let directory = health.clone();
            async move {
                if directory.is_available() {
                    HealthStatus::healthy()
                } else {
                    HealthStatus::unhealthy("user directory lock is poisoned")
                }
            }
        })
        .task(Task::new("clear-users", move || async move {
            format!("removed {} users\n", tasks.clear())
        }))
        .run()
        .await?;

    Ok(())
}
