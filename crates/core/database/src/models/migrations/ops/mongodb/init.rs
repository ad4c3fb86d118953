use super::scripts::LATEST_REVISION;

use crate::mongodb::bson::doc;
use crate::MongoDb;

pub async fn create_database(db: &MongoDb) {
    info!("Creating database.");
    let db = db.db();

    db.create_collection("users")
        .await
        .expect("Failed to create users collection.");

    db.create_collection("notifications")
        .await
        .expect("Failed to create notifications collection.");

    db.create_collection("conversations")
        .await
        .expect("Failed to create conversations collection.");

    db.create_collection("conversation_participants")
        .await
        .expect("Failed to create conversation_participants collection.");

    db.create_collection("messages")
        .await
        .expect("Failed to create messages collection.");

    db.create_collection("migrations")
        .await
        .expect("Failed to create migrations collection.");

    db.run_command(doc! {
        "createIndexes": "users",
        "indexes": [
            {
                "key": {
                    "username": 1_i32
                },
                "name": "username",
                "unique": true
            }
        ]
    })
    .await
    .expect("Failed to create username index.");

    db.run_command(doc! {
        "createIndexes": "notifications",
        "indexes": [
            {
                "key": {
                    "userId": 1_i32,
                    "createdAt": -1_i32
                },
                "name": "user_created_compound"
            },
            {
                "key": {
                    "userId": 1_i32,
                    "isRead": 1_i32
                },
                "name": "user_read_compound"
            }
        ]
    })
    .await
    .expect("Failed to create notifications index.");

    db.run_command(doc! {
        "createIndexes": "conversations",
        "indexes": [
            {
                "key": {
                    "recipients": 1_i32
                },
                "name": "recipients"
            }
        ]
    })
    .await
    .expect("Failed to create conversations index.");

    db.run_command(doc! {
        "createIndexes": "conversation_participants",
        "indexes": [
            {
                "key": {
                    "_id.conversation": 1_i32,
                    "_id.user": 1_i32
                },
                "name": "compound_id"
            },
            {
                "key": {
                    "_id.user": 1_i32
                },
                "name": "user_id"
            }
        ]
    })
    .await
    .expect("Failed to create conversation_participants index.");

    db.run_command(doc! {
        "createIndexes": "messages",
        "indexes": [
            {
                "key": {
                    "conversationId": 1_i32,
                    "createdAt": -1_i32
                },
                "name": "conversation_created_compound"
            },
            {
                "key": {
                    "senderId": 1_i32
                },
                "name": "sender"
            }
        ]
    })
    .await
    .expect("Failed to create messages index.");

    db.collection("migrations")
        .insert_one(doc! {
            "_id": 0_i32,
            "revision": LATEST_REVISION
        })
        .await
        .expect("Failed to save migration info.");

    info!("Created database.");
}
