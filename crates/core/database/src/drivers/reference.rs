use std::{collections::HashMap, sync::Arc};

use futures::lock::Mutex;

use crate::{Conversation, ConversationParticipant, Message, Notification, ParticipantKey, User};

database_derived!(
    /// Reference implementation
    #[derive(Default)]
    pub struct ReferenceDb {
        pub users: Arc<Mutex<HashMap<String, User>>>,
        pub notifications: Arc<Mutex<HashMap<String, Notification>>>,
        pub conversations: Arc<Mutex<HashMap<String, Conversation>>>,
        pub conversation_participants:
            Arc<Mutex<HashMap<ParticipantKey, ConversationParticipant>>>,
        pub messages: Arc<Mutex<HashMap<String, Message>>>,
    }
);
