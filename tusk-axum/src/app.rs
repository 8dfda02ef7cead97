use std::sync::Arc;

use axum::Router;
use tokio::net::{TcpListener, ToSocketAddrs};
use tusk_blob::UploadAdapter;

use crate::{routes, TusSettings, TuskAxumState};

#[derive(Clone)]
pub struct TuskAxumApp {
    pub state: TuskAxumState,
    pub router: Router<()>,
}

impl TuskAxumApp {
    pub fn new(uploads: UploadAdapter, settings: TusSettings) -> Self {
        let state = TuskAxumState::new(uploads, settings);
        Self {
            router: routes::router(state.clone()),
            state,
        }
    }

    pub fn uploads(&self) -> &Arc<UploadAdapter> {
        &self.state.uploads
    }

    pub fn settings(&self) -> &TusSettings {
        &self.state.settings
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}

pub fn tusk(uploads: UploadAdapter, settings: TusSettings) -> TuskAxumApp {
    TuskAxumApp::new(uploads, settings)
}
