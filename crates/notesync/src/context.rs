use std::sync::Arc;

use crate::adapter::ModelAdapter;
use crate::attachments::AttachmentStore;
use crate::gateway::RemoteGateway;
use crate::store::StoreHandle;

/// Collaborators shared by the controller and the UI facade.
///
/// One store handle is passed explicitly to every component that needs it;
/// there is no process-wide collection.
#[derive(Clone)]
pub struct SyncContext {
    pub gateway: Arc<dyn RemoteGateway>,
    pub attachments: Option<Arc<dyn AttachmentStore>>,
    pub adapter: ModelAdapter,
    pub store: StoreHandle,
}

impl SyncContext {
    pub fn new(gateway: Arc<dyn RemoteGateway>, store: StoreHandle) -> Self {
        Self {
            gateway,
            attachments: None,
            adapter: ModelAdapter::default(),
            store,
        }
    }

    pub fn with_attachments(mut self, attachments: Arc<dyn AttachmentStore>) -> Self {
        self.attachments = Some(attachments);
        self
    }

    pub fn with_adapter(mut self, adapter: ModelAdapter) -> Self {
        self.adapter = adapter;
        self
    }
}
