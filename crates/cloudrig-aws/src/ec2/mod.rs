//! Amazon EC2: Outposts local gateway routes

pub mod local_gateway_route;

pub use local_gateway_route::LocalGatewayRouteResource;
