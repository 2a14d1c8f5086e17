use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use super::Store;
use crate::{
    accounts::model::{AuthToken, User, UserField},
    error::StoreError,
    posts::model::Post,
};

/// Row shape of the `users` table.
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password: String,
    role: Option<String>,
    tokens: Json<Vec<AuthToken>>,
    avatar: Option<Vec<u8>>,
    created_at: OffsetDateTime,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User::from_stored(
            r.id,
            r.name,
            r.email,
            r.password,
            r.role,
            r.tokens.0,
            r.avatar,
            r.created_at,
        )
    }
}

const USER_COLUMNS: &str = "id, name, email, password, role, tokens, avatar, created_at";

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .context("connect to database")?;
        Ok(Self { db })
    }

    pub fn from_pool(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.db).await?;
        info!("database migrations applied");
        Ok(())
    }
}

fn map_write_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            let field = match db.constraint() {
                Some("users_email_key") => "email",
                _ => "id",
            };
            return StoreError::Duplicate { field };
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password, role, tokens, avatar, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.id())
        .bind(user.name())
        .bind(user.email())
        .bind(user.password())
        .bind(user.role())
        .bind(Json(user.tokens()))
        .bind(user.avatar())
        .bind(user.created_at())
        .execute(&self.db)
        .await
        .map_err(map_write_err)?;
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET ");
        let mut set = qb.separated(", ");
        let mut columns = 0;
        for field in user.dirty_fields() {
            columns += 1;
            match field {
                UserField::Name => set.push("name = ").push_bind_unseparated(user.name()),
                UserField::Email => set.push("email = ").push_bind_unseparated(user.email()),
                UserField::Password => {
                    set.push("password = ").push_bind_unseparated(user.password())
                }
                UserField::Role => set.push("role = ").push_bind_unseparated(user.role()),
                UserField::Tokens => set
                    .push("tokens = ")
                    .push_bind_unseparated(Json(user.tokens())),
                UserField::Avatar => set.push("avatar = ").push_bind_unseparated(user.avatar()),
            };
        }
        if columns == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
                    .bind(user.id())
                    .fetch_one(&self.db)
                    .await?;
            if !exists {
                return Err(StoreError::Database(sqlx::Error::RowNotFound));
            }
            return Ok(());
        }
        qb.push(" WHERE id = ").push_bind(user.id());

        let res = qb
            .build()
            .execute(&self.db)
            .await
            .map_err(map_write_err)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        }
        Ok(())
    }

    async fn append_token(&self, user_id: Uuid, token: &AuthToken) -> Result<(), StoreError> {
        let res = sqlx::query("UPDATE users SET tokens = tokens || $2::jsonb WHERE id = $1")
            .bind(user_id)
            .bind(Json(std::slice::from_ref(token)))
            .execute(&self.db)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        }
        Ok(())
    }

    async fn remove_token(&self, user_id: Uuid, token: &str) -> Result<(), StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET tokens = COALESCE(
                       (SELECT jsonb_agg(e.t ORDER BY e.i)
                          FROM jsonb_array_elements(tokens) WITH ORDINALITY AS e(t, i)
                         WHERE e.t->>'token' <> $2),
                       '[]'::jsonb)
             WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(token)
        .execute(&self.db)
        .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        }
        Ok(())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(User::from))
    }

    async fn delete_user_cascade(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let mut tx = self.db.begin().await?;
        let posts = sqlx::query("DELETE FROM posts WHERE author_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        debug!(%user_id, posts, "user and posts deleted");
        Ok(posts)
    }

    async fn insert_post(&self, post: &Post) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, author_id, title, body, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(post.id)
        .bind(post.author_id)
        .bind(&post.title)
        .bind(&post.body)
        .bind(post.created_at)
        .execute(&self.db)
        .await
        .map_err(map_write_err)?;
        Ok(())
    }

    async fn posts_by_author(&self, author_id: Uuid) -> Result<Vec<Post>, StoreError> {
        let rows = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, author_id, title, body, created_at
              FROM posts
             WHERE author_id = $1
             ORDER BY created_at DESC
            "#,
        )
        .bind(author_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}
