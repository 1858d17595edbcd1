/*
 * This module defines the protocol-agnostic model of a routed network:
 * addresses and masks, subnets, interfaces and the routers that own them.
 */

pub mod address;
pub mod interface;
pub mod router;
pub mod subnet;
