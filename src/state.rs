use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::session::SessionProvider;
use crate::backend::DynBackend;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub backend: DynBackend,
    pub session: Arc<SessionProvider>,
}
