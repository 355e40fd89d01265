//! # Command Vocabulary
//!
//! The closed set of command tags understood by the Satori engine.
//!
//! The engine defines what each command does; the client only sends the tag
//! in the `command` field of the request envelope.

use std::fmt;
use std::str::FromStr;

use crate::SatoriError;

/// A command tag sent as the `command` field of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    // Key/value
    /// Store a value under a key.
    Set,
    /// Read the value stored under a key.
    Get,
    /// Update fields of an existing value.
    Put,
    /// Delete a key.
    Delete,

    // Vertices and references
    /// Add a vertex to a key.
    SetVertex,
    /// Read the vertices of a key.
    GetVertex,
    /// Remove a vertex from a key.
    DeleteVertex,
    /// Add a reference to a key.
    SetRef,
    /// Read all references of a key.
    GetRefs,
    /// Remove all references of a key.
    DeleteRefs,
    /// Remove one reference of a key.
    DeleteRef,

    // Query and crypto
    /// Run an engine-side query.
    Query,
    /// Depth-first walk from a key.
    Dfs,
    /// Encrypt the value under a key.
    Encrypt,
    /// Decrypt the value under a key.
    Decrypt,

    // Arrays
    /// Append to an array value.
    Push,
    /// Remove the last element of an array value.
    Pop,
    /// Splice an array value.
    Splice,
    /// Remove a given element from an array value.
    Remove,

    // Notifications
    /// Start pushing notifications for a key.
    Notify,
    /// Stop pushing notifications for a key.
    Unnotify,

    // Semantic search
    /// Ask a natural-language question.
    Ask,
    /// Approximate nearest-neighbour search.
    Ann,
    /// Find values similar to a given one.
    GetSimilar,

    // Introspection
    /// List recent engine operations.
    GetOperations,
    /// Read access statistics of a key.
    GetAccessFrequency,
    /// Install an engine middleware.
    SetMiddleware,

    // Graph analysis
    GraphBfs,
    GraphDfs,
    GraphShortestPath,
    GraphConnectedComponents,
    /// Strongly connected components.
    GraphScc,
    GraphDegreeCentrality,
    GraphClosenessCentrality,
    GraphCentroid,

    // Mindspaces
    /// Create or replace a mindspace.
    SetMindspace,
    DeleteMindspace,
    ChatMindspace,
    LectureMindspace,
    /// Train the engine's embedding model.
    Train,
}

impl Command {
    /// Every command, in vocabulary order.
    pub const ALL: &'static [Command] = &[
        Self::Set,
        Self::Get,
        Self::Put,
        Self::Delete,
        Self::SetVertex,
        Self::GetVertex,
        Self::DeleteVertex,
        Self::SetRef,
        Self::GetRefs,
        Self::DeleteRefs,
        Self::DeleteRef,
        Self::Query,
        Self::Dfs,
        Self::Encrypt,
        Self::Decrypt,
        Self::Push,
        Self::Pop,
        Self::Splice,
        Self::Remove,
        Self::Notify,
        Self::Unnotify,
        Self::Ask,
        Self::Ann,
        Self::GetSimilar,
        Self::GetOperations,
        Self::GetAccessFrequency,
        Self::SetMiddleware,
        Self::GraphBfs,
        Self::GraphDfs,
        Self::GraphShortestPath,
        Self::GraphConnectedComponents,
        Self::GraphScc,
        Self::GraphDegreeCentrality,
        Self::GraphClosenessCentrality,
        Self::GraphCentroid,
        Self::SetMindspace,
        Self::DeleteMindspace,
        Self::ChatMindspace,
        Self::LectureMindspace,
        Self::Train,
    ];

    /// The wire tag for this command.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Set => "SET",
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::SetVertex => "SET_VERTEX",
            Self::GetVertex => "GET_VERTEX",
            Self::DeleteVertex => "DELETE_VERTEX",
            Self::SetRef => "SET_REF",
            Self::GetRefs => "GET_REFS",
            Self::DeleteRefs => "DELETE_REFS",
            Self::DeleteRef => "DELETE_REF",
            Self::Query => "QUERY",
            Self::Dfs => "DFS",
            Self::Encrypt => "ENCRYPT",
            Self::Decrypt => "DECRYPT",
            Self::Push => "PUSH",
            Self::Pop => "POP",
            Self::Splice => "SPLICE",
            Self::Remove => "REMOVE",
            Self::Notify => "NOTIFY",
            Self::Unnotify => "UNNOTIFY",
            Self::Ask => "ASK",
            Self::Ann => "ANN",
            Self::GetSimilar => "GET_SIMILAR",
            Self::GetOperations => "GET_OPERATIONS",
            Self::GetAccessFrequency => "GET_ACCESS_FREQUENCY",
            Self::SetMiddleware => "SET_MIDDLEWARE",
            Self::GraphBfs => "GRAPH_BFS",
            Self::GraphDfs => "GRAPH_DFS",
            Self::GraphShortestPath => "GRAPH_SHORTEST_PATH",
            Self::GraphConnectedComponents => "GRAPH_CONNECTED_COMPONENTS",
            Self::GraphScc => "GRAPH_SCC",
            Self::GraphDegreeCentrality => "GRAPH_DEGREE_CENTRALITY",
            Self::GraphClosenessCentrality => "GRAPH_CLOSENESS_CENTRALITY",
            Self::GraphCentroid => "GRAPH_CENTROID",
            Self::SetMindspace => "SET_MINDSPACE",
            Self::DeleteMindspace => "DELETE_MINDSPACE",
            Self::ChatMindspace => "CHAT_MINDSPACE",
            Self::LectureMindspace => "LECTURE_MINDSPACE",
            Self::Train => "TRAIN",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = SatoriError;

    /// Parse a wire tag. Matching is case-insensitive and accepts `-` for `_`
    /// so that `get-vertex` on the command line maps to `GET_VERTEX`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|command| command.as_str() == normalized)
            .ok_or_else(|| SatoriError::InvalidFields(format!("unknown command '{}'", s)))
    }
}

// =============================================================================
// TESTS
// =============================================================================
