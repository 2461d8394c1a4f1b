//! Encode/decode of full entity records. Shared between the stream wire
//! protocol and
//! the on-disk snapshot format, since both need the same "full
//! record" shape; the snapshot format additionally prefixes each record with
//! a version number (handled by the caller in `snapshot.rs`).

use crate::ids::{ParcelId, Uid, UserId};
use crate::limits::*;
use crate::model::{
    Avatar, LifecycleState, Material, Object, ObjectType, Parcel, Resource, ResourceState,
    Rotation, TexMatrix, Transform, Voxel,
};

use super::error::ReadErr;
use super::reader::ByteReader;
use super::writer::ByteWriter;

pub(crate) fn write_material(w: &mut ByteWriter, m: &Material) {
    w.vec3_f32(m.colour_rgb);
    w.string(&m.colour_texture_url);
    w.f32(m.roughness);
    w.f32(m.metallic);
    w.f32(m.opacity);
    w.f32(m.tex_matrix.a);
    w.f32(m.tex_matrix.b);
    w.f32(m.tex_matrix.c);
    w.f32(m.tex_matrix.d);
}

pub(crate) fn read_material(r: &mut ByteReader) -> Result<Material, ReadErr> {
    let colour_rgb = r.vec3_f32()?;
    let colour_texture_url = r.string(MAX_URL_LEN)?;
    let roughness = r.f32()?;
    let metallic = r.f32()?;
    let opacity = r.f32()?;
    let tex_matrix = TexMatrix {
        a: r.f32()?,
        b: r.f32()?,
        c: r.f32()?,
        d: r.f32()?,
    };
    Ok(Material {
        colour_rgb,
        colour_texture_url,
        roughness,
        metallic,
        opacity,
        tex_matrix,
    })
}

pub(crate) fn write_transform(w: &mut ByteWriter, t: &Transform) {
    w.vec3_f64(t.pos);
    w.vec3_f32(t.axis);
    w.f32(t.angle);
    w.vec3_f32(t.scale);
}

pub(crate) fn read_transform(r: &mut ByteReader) -> Result<Transform, ReadErr> {
    Ok(Transform {
        pos: r.vec3_f64()?,
        axis: r.vec3_f32()?,
        angle: r.f32()?,
        scale: r.vec3_f32()?,
    })
}

pub(crate) fn write_voxel(w: &mut ByteWriter, v: &Voxel) {
    w.vec3_i32(v.pos);
    w.u32(v.material_index);
}

pub(crate) fn read_voxel(r: &mut ByteReader) -> Result<Voxel, ReadErr> {
    Ok(Voxel {
        pos: r.vec3_i32()?,
        material_index: r.u32()?,
    })
}

pub(crate) fn write_object(w: &mut ByteWriter, o: &Object) {
    w.u64(o.uid.raw());
    w.u32(o.kind.to_wire());
    w.u64(o.owner_user_id.raw());
    w.f64(o.created_time);
    write_transform(w, &o.transform);
    w.string(&o.model_url);
    w.vec(&o.materials, write_material);
    w.bool(o.voxel_group.is_some());
    if let Some(voxels) = &o.voxel_group {
        w.vec(voxels, write_voxel);
    }
    w.string(&o.content);
    w.u32(o.lifecycle_state.to_wire());
}

pub(crate) fn read_object(r: &mut ByteReader) -> Result<Object, ReadErr> {
    let uid = Uid::from_raw(r.u64()?);
    let kind = ObjectType::from_wire(r.u32()?)
        .ok_or_else(|| ReadErr::Malformed(super::error::Malformed::UnknownEntityType(0)))?;
    let owner_user_id = UserId::from_raw(r.u64()?);
    let created_time = r.f64()?;
    let transform = read_transform(r)?;
    let model_url = r.string(MAX_URL_LEN)?;
    let materials = r.vec(MAX_MATERIALS, read_material)?;
    let has_voxels = r.bool()?;
    let voxel_group = if has_voxels {
        Some(r.vec(MAX_VOXELS, read_voxel)?)
    } else {
        None
    };
    let content = r.string(MAX_CONTENT_LEN)?;
    let lifecycle_state = LifecycleState::from_wire(r.u32()?)
        .ok_or_else(|| ReadErr::Malformed(super::error::Malformed::UnknownLifecycleState(0)))?;
    Ok(Object {
        uid,
        kind,
        owner_user_id,
        created_time,
        transform,
        model_url,
        materials,
        voxel_group,
        content,
        lifecycle_state,
        from_remote_other_dirty: false,
        from_remote_transform_dirty: false,
    })
}

pub(crate) fn write_avatar(w: &mut ByteWriter, a: &Avatar) {
    w.u64(a.uid.raw());
    w.u64(a.user_id.raw());
    w.string(&a.name);
    w.string(&a.model_url);
    w.vec3_f64(a.pos);
    w.vec3_f32(a.rotation.axis);
    w.f32(a.rotation.angle);
    w.u64(a.selected_object_uid.raw());
    w.u32(a.lifecycle_state.to_wire());
}

pub(crate) fn read_avatar(r: &mut ByteReader) -> Result<Avatar, ReadErr> {
    let uid = Uid::from_raw(r.u64()?);
    let user_id = UserId::from_raw(r.u64()?);
    let name = r.string(MAX_NAME_LEN)?;
    let model_url = r.string(MAX_URL_LEN)?;
    let pos = r.vec3_f64()?;
    let rotation = Rotation {
        axis: r.vec3_f32()?,
        angle: r.f32()?,
    };
    let selected_object_uid = Uid::from_raw(r.u64()?);
    let lifecycle_state = LifecycleState::from_wire(r.u32()?)
        .ok_or_else(|| ReadErr::Malformed(super::error::Malformed::UnknownLifecycleState(0)))?;
    Ok(Avatar {
        uid,
        user_id,
        name,
        model_url,
        pos,
        rotation,
        selected_object_uid,
        other_dirty: false,
        transform_dirty: false,
        lifecycle_state,
        last_activity: 0.0,
    })
}

pub(crate) fn write_parcel(w: &mut ByteWriter, p: &Parcel) {
    w.u64(p.id.raw());
    w.u64(p.owner_user_id.raw());
    w.vec(&p.admin_user_ids, |w, id| w.u64(id.raw()));
    w.vec(&p.writer_user_ids, |w, id| w.u64(id.raw()));
    w.bool(p.all_writeable);
    for v in &p.verts {
        w.vec2_f64(*v);
    }
    w.f64(p.zbounds.0);
    w.f64(p.zbounds.1);
    w.f64(p.created_time);
    w.string(&p.description);
    w.u32(p.lifecycle_state.to_wire());
}

pub(crate) fn read_parcel(r: &mut ByteReader) -> Result<Parcel, ReadErr> {
    let id = ParcelId::from_raw(r.u64()?);
    let owner_user_id = UserId::from_raw(r.u64()?);
    let admin_user_ids = r.vec(MAX_ROLE_USERS, |r| Ok(UserId::from_raw(r.u64()?)))?;
    let writer_user_ids = r.vec(MAX_ROLE_USERS, |r| Ok(UserId::from_raw(r.u64()?)))?;
    let all_writeable = r.bool()?;
    let mut verts = [crate::geom::Vec2::new(0.0, 0.0); 4];
    for v in verts.iter_mut() {
        *v = r.vec2_f64()?;
    }
    let zbounds = (r.f64()?, r.f64()?);
    let created_time = r.f64()?;
    let description = r.string(MAX_DESCRIPTION_LEN)?;
    let lifecycle_state = LifecycleState::from_wire(r.u32()?)
        .ok_or_else(|| ReadErr::Malformed(super::error::Malformed::UnknownLifecycleState(0)))?;
    Ok(Parcel {
        id,
        owner_user_id,
        admin_user_ids,
        writer_user_ids,
        all_writeable,
        verts,
        zbounds,
        created_time,
        description,
        lifecycle_state,
    })
}

pub(crate) fn write_resource(w: &mut ByteWriter, res: &Resource) {
    w.string(&res.url);
    w.string(&res.local_path);
    w.u64(res.owner_user_id.raw());
    w.u32(res.state.to_wire());
}

pub(crate) fn read_resource(r: &mut ByteReader) -> Result<Resource, ReadErr> {
    let url = r.string(MAX_URL_LEN)?;
    let local_path = r.string(MAX_URL_LEN)?;
    let owner_user_id = UserId::from_raw(r.u64()?);
    let state = ResourceState::from_wire(r.u32()?)
        .ok_or_else(|| ReadErr::Malformed(super::error::Malformed::UnknownResourceState(0)))?;
    Ok(Resource {
        url,
        local_path,
        owner_user_id,
        state,
    })
}
