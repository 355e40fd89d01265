//! # Command Facade
//!
//! One method per engine command. Each merges its command tag into the
//! caller's fields and delegates to [`SatoriClient::call`].

use crate::command::Command;
use crate::envelope::Response;
use crate::{Result, SatoriClient};
use serde_json::Value;

macro_rules! command_methods {
    ($($(#[$meta:meta])* $name:ident => $command:ident;)+) => {
        impl SatoriClient {
            $(
                $(#[$meta])*
                pub async fn $name(&self, fields: Value) -> Result<Response> {
                    self.call(Command::$command, fields).await
                }
            )+
        }
    };
}

command_methods! {
    /// `SET`: store `data` under `key`.
    set => Set;
    /// `GET`: read the value under `key`.
    get => Get;
    put => Put;
    delete => Delete;
    set_vertex => SetVertex;
    get_vertex => GetVertex;
    delete_vertex => DeleteVertex;
    set_ref => SetRef;
    get_refs => GetRefs;
    delete_refs => DeleteRefs;
    delete_ref => DeleteRef;
    query => Query;
    dfs => Dfs;
    encrypt => Encrypt;
    decrypt => Decrypt;
    push => Push;
    pop => Pop;
    splice => Splice;
    remove => Remove;
    ask => Ask;
    ann => Ann;
    get_similar => GetSimilar;
    get_access_frequency => GetAccessFrequency;
    set_middleware => SetMiddleware;
    graph_bfs => GraphBfs;
    graph_dfs => GraphDfs;
    graph_shortest_path => GraphShortestPath;
    graph_connected_components => GraphConnectedComponents;
    graph_scc => GraphScc;
    graph_degree_centrality => GraphDegreeCentrality;
    graph_closeness_centrality => GraphClosenessCentrality;
    graph_centroid => GraphCentroid;
    set_mindspace => SetMindspace;
    delete_mindspace => DeleteMindspace;
    chat_mindspace => ChatMindspace;
    lecture_mindspace => LectureMindspace;
    /// `TRAIN`: retrain the engine's embeddings.
    train => Train;
}

impl SatoriClient {
    /// `GET_OPERATIONS`: list recent engine operations. Takes no fields.
    pub async fn get_operations(&self) -> Result<Response> {
        self.call(Command::GetOperations, Value::Null).await
    }

    /// Alias of [`set_mindspace`](Self::set_mindspace).
    pub async fn create_mindspace(&self, fields: Value) -> Result<Response> {
        self.set_mindspace(fields).await
    }
}
