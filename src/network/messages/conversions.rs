use crate::chord::node::PredecessorView;
use crate::network::messages::chord::GetPredecessorResponse;

// On the wire an absent predecessor is the empty string.

impl From<PredecessorView> for GetPredecessorResponse {
    fn from(view: PredecessorView) -> Self {
        GetPredecessorResponse {
            predecessor: view.predecessor.unwrap_or_default(),
            successors: view.successors,
        }
    }
}

impl From<GetPredecessorResponse> for PredecessorView {
    fn from(response: GetPredecessorResponse) -> Self {
        PredecessorView {
            predecessor: if response.predecessor.is_empty() {
                None
            } else {
                Some(response.predecessor)
            },
            successors: response.successors,
        }
    }
}
