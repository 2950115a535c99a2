pub mod group_roles;
