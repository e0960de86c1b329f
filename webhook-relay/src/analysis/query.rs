//! GraphQL document sent to the analysis API.

use serde::Serialize;

/// Fetches the finished V6 analysis and similar tracks for one library track.
///
/// Not-found and similarity errors come back as data in the response, not as
/// GraphQL errors.
pub const LIBRARY_TRACK_QUERY: &str = r#"
query LibraryTrack($libraryTrackId: ID!) {
  libraryTrack(id: $libraryTrackId) {
    ... on LibraryTrackNotFoundError {
      message
    }
    ... on LibraryTrack {
      id
      audioAnalysisV6 {
        ... on AudioAnalysisV6Finished {
          result {
            segments {
              timestamps
              genre {
                classical
                ambient
                blues
              }
              mood {
                calm
                chilled
                dark
                sexy
              }
            }
            genreTags
            moodTags
            bpmPrediction {
              value
              confidence
            }
          }
        }
      }
      similarLibraryTracks {
        ... on SimilarLibraryTracksError {
          message
        }
        ... on SimilarLibraryTrackConnection {
          edges {
            node {
              libraryTrack {
                id
              }
            }
          }
        }
      }
    }
  }
}
"#;

/// JSON body of a GraphQL POST.
#[derive(Debug, Serialize)]
pub struct GraphQlRequest<'a> {
    pub query: &'static str,
    pub variables: LibraryTrackVariables<'a>,
}

#[derive(Debug, Serialize)]
pub struct LibraryTrackVariables<'a> {
    #[serde(rename = "libraryTrackId")]
    pub library_track_id: &'a str,
}

impl<'a> GraphQlRequest<'a> {
    /// Build the library track query for one track id.
    pub fn library_track(track_id: &'a str) -> Self {
        Self {
            query: LIBRARY_TRACK_QUERY,
            variables: LibraryTrackVariables {
                library_track_id: track_id,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_library_track_request_shape() {
        let request = GraphQlRequest::library_track("abc123");
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["variables"], json!({"libraryTrackId": "abc123"}));
        assert_eq!(value["query"], json!(LIBRARY_TRACK_QUERY));
    }

    #[test]
    fn test_query_declares_variable() {
        assert!(LIBRARY_TRACK_QUERY.contains("query LibraryTrack($libraryTrackId: ID!)"));
        assert!(LIBRARY_TRACK_QUERY.contains("libraryTrack(id: $libraryTrackId)"));
    }
}
