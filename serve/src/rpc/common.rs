//! Session RPCs: `SystemInfo`, `Version`, `RegisterUser`.

use arhub::error::Result;
use arhub_data::rpc::common::{RegisterUserArgs, SystemInfoData, VersionData};

use crate::dispatch::{supported_rpc_requests, Call, Out};

pub async fn system_info(call: &Call<'_>) -> Result<Out> {
    let _ = call;
    let data = SystemInfoData {
        version: arhub::version().to_string(),
        api_version: arhub::api_version().to_string(),
        supported_rpc_requests: supported_rpc_requests(),
    };
    Ok(Out::data(serde_json::to_value(data)?))
}

pub async fn version(call: &Call<'_>) -> Result<Out> {
    let _ = call;
    Ok(Out::data(serde_json::to_value(VersionData {
        version: arhub::version().to_string(),
    })?))
}

pub async fn register_user(call: &Call<'_>, args: RegisterUserArgs) -> Result<Out> {
    call.ctx
        .users
        .login(&args.user_name, call.client, &call.ctx.clients)
        .await?;
    Ok(Out::empty())
}
