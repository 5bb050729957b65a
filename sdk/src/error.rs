// SPDX-License-Identifier: Apache-2.0

use std::result::Result as StdResult;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("failed to start plugin RPC server")]
	FailedToStartServer(#[source] tonic::transport::Error),

	#[error("duplicate capability id '{0}' within one plugin")]
	DuplicateCapability(String),

	#[error(transparent)]
	Wire(#[from] capgate_proto::Error),
}

pub type Result<T> = StdResult<T, Error>;
