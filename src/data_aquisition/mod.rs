/*
 * This module provides data aquisition abilites for the application.
 * It doesn't care what it gets, just how.
 * Live SNMP agents and recorded dumps both sit behind the same client trait.
 */

pub mod core;
pub mod oids;
pub mod replay;
pub mod retry;
pub mod snmp;
